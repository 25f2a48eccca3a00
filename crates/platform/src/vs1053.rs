//! VS1053-class MP3 decoder driver.
//!
//! Reference: VLSI VS1053b datasheet, section 7 (SCI registers) and 7.3
//! (SDI data interface).
//!
//! The chip hangs off one SPI bus with two chip selects: XCS frames SCI
//! register operations, XDCS frames SDI stream data. DREQ is a digital
//! input that goes high when the chip can take at least 32 more bytes.
//! XRESET is active low.

use embassy_time::Timer;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiBus;

use crate::decoder::{DecoderControl, DecoderDataPort, DecoderError, RESET_SETTLE};

/// SCI read opcode.
pub const SCI_READ: u8 = 0x03;
/// SCI write opcode.
pub const SCI_WRITE: u8 = 0x02;

/// Register 0x00: mode control.
pub const REG_MODE: u8 = 0x00;
/// Register 0x01: status.
pub const REG_STATUS: u8 = 0x01;
/// Register 0x02: bass/treble enhancement.
pub const REG_BASS: u8 = 0x02;
/// Register 0x03: clock multiplier.
pub const REG_CLOCKF: u8 = 0x03;
/// Register 0x04: decode time in seconds.
pub const REG_DECODE_TIME: u8 = 0x04;
/// Register 0x06: WRAM read/write port.
pub const REG_WRAM: u8 = 0x06;
/// Register 0x07: WRAM address.
pub const REG_WRAMADDR: u8 = 0x07;
/// Register 0x0B: per-channel volume, one byte each.
pub const REG_VOL: u8 = 0x0b;

/// MODE bit: native SPI mode (SM_SDINEW).
pub const MODE_NATIVE: u16 = 1 << 11;
/// MODE bit: software reset (SM_RESET, self-clearing).
pub const MODE_SOFT_RESET: u16 = 1 << 2;

/// WRAM address of the stream resync counter; zeroing it lets the chip
/// resynchronise onto mid-stream data (needed for WMA/M4A payloads).
pub const WRAM_RESYNC: u16 = 0x1e29;

/// CLOCKF value selecting CLKI = XTALI × 3.
pub const CLOCKF_X3: u16 = 0x6000;

/// Power-on volume: slightly under half loudness per channel.
pub const DEFAULT_VOLUME: u8 = 0x70;

/// Highest bass enhancement the 4-bit field holds.
pub const BASS_MAX: u8 = 0x0F;

/// VS1053 driver over an SPI bus and four GPIO lines.
pub struct Vs1053<SPI, XCS, XDCS, RST, DREQ> {
    spi: SPI,
    xcs: XCS,
    xdcs: XDCS,
    xreset: RST,
    dreq: DREQ,
}

impl<SPI, XCS, XDCS, RST, DREQ> Vs1053<SPI, XCS, XDCS, RST, DREQ>
where
    SPI: SpiBus,
    XCS: OutputPin,
    XDCS: OutputPin,
    RST: OutputPin,
    DREQ: InputPin,
{
    /// Take ownership of the bus and control lines.
    ///
    /// Both chip selects are deasserted; call
    /// [`init`](DecoderControl::init) before streaming.
    pub fn new(spi: SPI, mut xcs: XCS, mut xdcs: XDCS, mut xreset: RST, dreq: DREQ) -> Self {
        let _ = xcs.set_high();
        let _ = xdcs.set_high();
        let _ = xreset.set_high();
        Self {
            spi,
            xcs,
            xdcs,
            xreset,
            dreq,
        }
    }

    /// Toggle XRESET and wait for the chip to come back up.
    pub async fn hard_reset(&mut self) -> Result<(), DecoderError> {
        self.xreset.set_low().map_err(|_| DecoderError::Bus)?;
        Timer::after(RESET_SETTLE).await;
        self.xreset.set_high().map_err(|_| DecoderError::Bus)?;
        Timer::after(RESET_SETTLE).await;
        self.wait_ready();
        Ok(())
    }

    /// Spin until DREQ reports the chip ready.
    fn wait_ready(&mut self) {
        while !self.ready() {}
    }

    fn write_register(&mut self, reg: u8, value: u16) -> Result<(), DecoderError> {
        let [hi, lo] = value.to_be_bytes();
        self.xcs.set_low().map_err(|_| DecoderError::Bus)?;
        let res = self.spi.write(&[SCI_WRITE, reg, hi, lo]);
        let _ = self.xcs.set_high();
        res.map_err(|_| DecoderError::Bus)?;
        self.wait_ready();
        Ok(())
    }

    fn read_register(&mut self, reg: u8) -> Result<u16, DecoderError> {
        self.xcs.set_low().map_err(|_| DecoderError::Bus)?;
        let res = self.spi.write(&[SCI_READ, reg]);
        let mut value = [0u8; 2];
        let res = res.and_then(|()| self.spi.transfer(&mut value, &[0u8; 2]));
        let _ = self.xcs.set_high();
        res.map_err(|_| DecoderError::Bus)?;
        self.wait_ready();
        Ok(u16::from_be_bytes(value))
    }
}

impl<SPI, XCS, XDCS, RST, DREQ> DecoderControl for Vs1053<SPI, XCS, XDCS, RST, DREQ>
where
    SPI: SpiBus,
    XCS: OutputPin,
    XDCS: OutputPin,
    RST: OutputPin,
    DREQ: InputPin,
{
    async fn init(&mut self) -> Result<(), DecoderError> {
        self.hard_reset().await?;
        // Triple the internal clock before any real traffic; the chip needs
        // a moment to relock afterwards.
        self.write_register(REG_CLOCKF, CLOCKF_X3)?;
        Timer::after(RESET_SETTLE).await;
        self.set_volume(DEFAULT_VOLUME)?;
        log::info!("decoder initialised");
        Ok(())
    }

    fn set_volume(&mut self, volume: u8) -> Result<(), DecoderError> {
        // Same attenuation on both channels.
        self.write_register(REG_VOL, u16::from_be_bytes([volume, volume]))
    }

    fn volume(&mut self) -> Result<u8, DecoderError> {
        // Channels always match; the low byte is enough.
        #[allow(clippy::cast_possible_truncation)] // masked to 8 bits
        Ok((self.read_register(REG_VOL)? & 0x00FF) as u8)
    }

    fn set_bass(&mut self, level: u8) -> Result<(), DecoderError> {
        // Bass enhancement lives in bits 7:4 of the BASS register.
        self.write_register(REG_BASS, u16::from(level & BASS_MAX) << 4)
    }

    fn bass(&mut self) -> Result<u8, DecoderError> {
        #[allow(clippy::cast_possible_truncation)] // masked to 4 bits
        Ok(((self.read_register(REG_BASS)? & 0x00F0) >> 4) as u8)
    }

    fn decode_time(&mut self) -> Result<u16, DecoderError> {
        self.read_register(REG_DECODE_TIME)
    }

    fn begin_stream(&mut self) -> Result<(), DecoderError> {
        self.write_register(REG_MODE, MODE_NATIVE)?;
        // Zero the resync counter so mid-stream payloads lock on.
        self.write_register(REG_WRAMADDR, WRAM_RESYNC)?;
        self.write_register(REG_WRAM, 0x0000)?;
        // The datasheet wants the decode-time clear written twice.
        self.write_register(REG_DECODE_TIME, 0x0000)?;
        self.write_register(REG_DECODE_TIME, 0x0000)?;
        Ok(())
    }

    fn finish_stream(&mut self) -> Result<(), DecoderError> {
        // Soft reset drains the stream buffer and quiets the output.
        self.write_register(REG_MODE, MODE_NATIVE | MODE_SOFT_RESET)
    }
}

impl<SPI, XCS, XDCS, RST, DREQ> DecoderDataPort for Vs1053<SPI, XCS, XDCS, RST, DREQ>
where
    SPI: SpiBus,
    XCS: OutputPin,
    XDCS: OutputPin,
    RST: OutputPin,
    DREQ: InputPin,
{
    fn ready(&mut self) -> bool {
        match self.dreq.is_high() {
            Ok(level) => level,
            Err(_) => {
                log::warn!("DREQ read failed; treating as not ready");
                false
            }
        }
    }

    fn begin_transfer(&mut self) {
        let _ = self.xdcs.set_low();
    }

    fn end_transfer(&mut self) {
        let _ = self.xdcs.set_high();
    }

    fn send_word(&mut self, word: u16) -> Result<(), DecoderError> {
        self.spi
            .write(&word.to_be_bytes())
            .map_err(|_| DecoderError::Bus)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    /// Records every SPI write; reads shift out zeroes.
    #[derive(Default)]
    struct BusLog {
        writes: Vec<Vec<u8>>,
    }

    impl embedded_hal::spi::ErrorType for BusLog {
        type Error = core::convert::Infallible;
    }

    impl SpiBus for BusLog {
        fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
            words.fill(0);
            Ok(())
        }
        fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
            self.writes.push(words.to_vec());
            Ok(())
        }
        fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
            self.writes.push(write.to_vec());
            read.fill(0);
            Ok(())
        }
        fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
            self.writes.push(words.to_vec());
            words.fill(0);
            Ok(())
        }
        fn flush(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Line;

    impl embedded_hal::digital::ErrorType for Line {
        type Error = core::convert::Infallible;
    }

    impl OutputPin for Line {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
        fn set_high(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    /// DREQ stand-in that is always ready.
    #[derive(Default)]
    struct ReadyLine;

    impl embedded_hal::digital::ErrorType for ReadyLine {
        type Error = core::convert::Infallible;
    }

    impl InputPin for ReadyLine {
        fn is_high(&mut self) -> Result<bool, Self::Error> {
            Ok(true)
        }
        fn is_low(&mut self) -> Result<bool, Self::Error> {
            Ok(false)
        }
    }

    fn driver() -> Vs1053<BusLog, Line, Line, Line, ReadyLine> {
        Vs1053::new(BusLog::default(), Line, Line, Line, ReadyLine)
    }

    fn sci_writes(dec: &Vs1053<BusLog, Line, Line, Line, ReadyLine>) -> Vec<(u8, u16)> {
        dec.spi
            .writes
            .iter()
            .filter(|w| w.len() == 4 && w[0] == SCI_WRITE)
            .map(|w| (w[1], u16::from_be_bytes([w[2], w[3]])))
            .collect()
    }

    #[tokio::test]
    async fn init_boosts_clock_then_sets_default_volume() {
        let mut dec = driver();
        dec.init().await.unwrap();
        let writes = sci_writes(&dec);
        assert_eq!(writes[0], (REG_CLOCKF, CLOCKF_X3));
        assert_eq!(
            writes[1],
            (REG_VOL, u16::from_be_bytes([DEFAULT_VOLUME, DEFAULT_VOLUME]))
        );
    }

    #[test]
    fn volume_is_duplicated_across_channels() {
        let mut dec = driver();
        dec.set_volume(0x2a).unwrap();
        assert_eq!(sci_writes(&dec), [(REG_VOL, 0x2a2a)]);
    }

    #[test]
    fn bass_level_lives_in_the_high_nibble() {
        let mut dec = driver();
        dec.set_bass(0x05).unwrap();
        assert_eq!(sci_writes(&dec), [(REG_BASS, 0x0050)]);
    }

    #[test]
    fn bass_level_is_masked_to_four_bits() {
        let mut dec = driver();
        dec.set_bass(0xFF).unwrap();
        assert_eq!(sci_writes(&dec), [(REG_BASS, 0x00F0)]);
    }

    #[test]
    fn begin_stream_programs_mode_resync_and_decode_time() {
        let mut dec = driver();
        dec.begin_stream().unwrap();
        assert_eq!(
            sci_writes(&dec),
            [
                (REG_MODE, MODE_NATIVE),
                (REG_WRAMADDR, WRAM_RESYNC),
                (REG_WRAM, 0x0000),
                // written twice per the datasheet
                (REG_DECODE_TIME, 0x0000),
                (REG_DECODE_TIME, 0x0000),
            ]
        );
    }

    #[test]
    fn finish_stream_soft_resets() {
        let mut dec = driver();
        dec.finish_stream().unwrap();
        assert_eq!(sci_writes(&dec), [(REG_MODE, MODE_NATIVE | MODE_SOFT_RESET)]);
    }

    #[test]
    fn stream_words_go_out_big_endian() {
        let mut dec = driver();
        dec.begin_transfer();
        dec.send_word(0xBEEF).unwrap();
        dec.end_transfer();
        assert_eq!(dec.spi.writes, [vec![0xBE, 0xEF]]);
    }

    #[test]
    fn read_register_issues_read_opcode() {
        let mut dec = driver();
        let value = dec.read_register(REG_STATUS).unwrap();
        assert_eq!(value, 0);
        assert_eq!(dec.spi.writes[0], vec![SCI_READ, REG_STATUS]);
    }
}
