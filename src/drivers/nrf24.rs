//! nRF24L01 packet radio over a blocking SPI device

use embassy_time::{Duration, Instant, Timer};
use embedded_hal::{digital::OutputPin, spi::SpiDevice};
use log::{debug, info, warn};

use crate::{
    error::ParamError,
    hal::Radio,
    protocol::radio::{CrcLength, DataRate, RadioConfig, PACKET_LEN},
};

mod reg {
    pub const CONFIG: u8 = 0x00;
    pub const EN_AA: u8 = 0x01;
    pub const EN_RXADDR: u8 = 0x02;
    pub const SETUP_AW: u8 = 0x03;
    pub const SETUP_RETR: u8 = 0x04;
    pub const RF_CH: u8 = 0x05;
    pub const RF_SETUP: u8 = 0x06;
    pub const STATUS: u8 = 0x07;
    pub const RX_ADDR_P0: u8 = 0x0A;
    pub const RX_ADDR_P1: u8 = 0x0B;
    pub const TX_ADDR: u8 = 0x10;
    pub const RX_PW_P0: u8 = 0x11;
    pub const RX_PW_P1: u8 = 0x12;
    pub const FIFO_STATUS: u8 = 0x17;
}

mod cmd {
    pub const R_REGISTER: u8 = 0x00;
    pub const W_REGISTER: u8 = 0x20;
    pub const R_RX_PAYLOAD: u8 = 0x61;
    pub const W_TX_PAYLOAD: u8 = 0xA0;
    pub const FLUSH_TX: u8 = 0xE1;
    pub const FLUSH_RX: u8 = 0xE2;
    pub const NOP: u8 = 0xFF;
}

const EN_CRC: u8 = 1 << 3;
const CRCO: u8 = 1 << 2;
const PWR_UP: u8 = 1 << 1;
const PRIM_RX: u8 = 1 << 0;

const RX_DR: u8 = 1 << 6;
const TX_DS: u8 = 1 << 5;
const MAX_RT: u8 = 1 << 4;

const RF_DR_LOW: u8 = 1 << 5;
const RF_DR_HIGH: u8 = 1 << 3;

const RX_EMPTY: u8 = 1 << 0;

/// 5-byte addresses
const AW_5_BYTES: u8 = 0x03;

#[derive(Debug)]
pub enum Error<SE, PE> {
    Spi(SE),
    Pin(PE),
    Param(ParamError),
    /// Auto-retransmit count exhausted without an ACK
    MaxRetries,
    /// Neither TX_DS nor MAX_RT was raised in time
    Timeout,
}

pub struct Nrf24<SPI, CE> {
    spi: SPI,
    ce: CE,
    config: RadioConfig,
    tx_timeout: Duration,
}

impl<SPI, CE> Nrf24<SPI, CE>
where
    SPI: SpiDevice,
    CE: OutputPin,
{
    pub fn new(spi: SPI, ce: CE, config: RadioConfig) -> Self {
        Self {
            spi,
            ce,
            config,
            tx_timeout: Duration::from_millis(10),
        }
    }

    pub fn with_tx_timeout(mut self, timeout: Duration) -> Self {
        self.tx_timeout = timeout;
        self
    }

    pub fn spi(&mut self) -> &mut SPI {
        &mut self.spi
    }

    pub fn config(&self) -> &RadioConfig {
        &self.config
    }

    /// Applies the link configuration and starts listening on the read pipe
    pub async fn init(&mut self) -> Result<(), Error<SPI::Error, CE::Error>> {
        self.config.validate().map_err(Error::Param)?;
        self.ce.set_low().map_err(Error::Pin)?;
        Timer::after_millis(5).await;

        self.write_reg(reg::SETUP_RETR, self.config.setup_retr())?;

        let mut rf_setup = self.read_reg(reg::RF_SETUP)? & !(RF_DR_LOW | RF_DR_HIGH);
        rf_setup |= match self.config.data_rate {
            DataRate::Kbps250 => RF_DR_LOW,
            DataRate::Mbps1 => 0,
            DataRate::Mbps2 => RF_DR_HIGH,
        };
        self.write_reg(reg::RF_SETUP, rf_setup)?;

        self.write_reg(reg::EN_AA, 0x3F)?;
        self.write_reg(reg::EN_RXADDR, 0x03)?;
        self.write_reg(reg::RX_PW_P0, PACKET_LEN as u8)?;
        self.write_reg(reg::RX_PW_P1, PACKET_LEN as u8)?;
        self.write_reg(reg::SETUP_AW, AW_5_BYTES)?;
        self.write_reg(reg::RF_CH, self.config.channel)?;

        // Pipe 0 receives the auto-ACKs for the write pipe
        let write_address = self.config.write_address;
        let read_address = self.config.read_address;
        self.write_addr(reg::TX_ADDR, &write_address)?;
        self.write_addr(reg::RX_ADDR_P0, &write_address)?;
        self.write_addr(reg::RX_ADDR_P1, &read_address)?;

        self.write_reg(reg::STATUS, RX_DR | TX_DS | MAX_RT)?;
        self.command(&mut [cmd::FLUSH_RX])?;
        self.command(&mut [cmd::FLUSH_TX])?;

        self.write_reg(reg::CONFIG, self.config_bits())?;
        Timer::after_millis(5).await;

        self.start_listening()?;
        info!("nRF24 ready on channel {}", self.config.channel);
        Ok(())
    }

    fn config_bits(&self) -> u8 {
        match self.config.crc {
            CrcLength::OneByte => EN_CRC | PWR_UP,
            CrcLength::TwoBytes => EN_CRC | CRCO | PWR_UP,
        }
    }

    pub fn start_listening(&mut self) -> Result<(), Error<SPI::Error, CE::Error>> {
        self.write_reg(reg::CONFIG, self.config_bits() | PRIM_RX)?;
        self.write_reg(reg::STATUS, RX_DR | TX_DS | MAX_RT)?;
        self.ce.set_high().map_err(Error::Pin)
    }

    pub fn stop_listening(&mut self) -> Result<(), Error<SPI::Error, CE::Error>> {
        self.ce.set_low().map_err(Error::Pin)?;
        self.write_reg(reg::CONFIG, self.config_bits())
    }

    /// Runs one SPI command in place and returns the STATUS byte clocked out first
    fn command(&mut self, buf: &mut [u8]) -> Result<u8, Error<SPI::Error, CE::Error>> {
        self.spi.transfer_in_place(buf).map_err(Error::Spi)?;
        Ok(buf[0])
    }

    fn status(&mut self) -> Result<u8, Error<SPI::Error, CE::Error>> {
        self.command(&mut [cmd::NOP])
    }

    pub fn read_reg(&mut self, reg: u8) -> Result<u8, Error<SPI::Error, CE::Error>> {
        let mut buf = [cmd::R_REGISTER | reg, 0];
        self.command(&mut buf)?;
        Ok(buf[1])
    }

    pub fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), Error<SPI::Error, CE::Error>> {
        self.command(&mut [cmd::W_REGISTER | reg, value]).map(|_| ())
    }

    fn write_addr(&mut self, reg: u8, addr: &[u8; 5]) -> Result<(), Error<SPI::Error, CE::Error>> {
        let mut buf = [0u8; 6];
        buf[0] = cmd::W_REGISTER | reg;
        buf[1..].copy_from_slice(addr);
        self.command(&mut buf).map(|_| ())
    }

    async fn wait_tx(&mut self) -> Result<u8, Error<SPI::Error, CE::Error>> {
        let deadline = Instant::now() + self.tx_timeout;
        loop {
            let status = self.status()?;
            if status & (TX_DS | MAX_RT) != 0 {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                return Err(Error::Timeout);
            }
            Timer::after_micros(100).await;
        }
    }
}

impl<SPI, CE> Radio for Nrf24<SPI, CE>
where
    SPI: SpiDevice,
    CE: OutputPin,
{
    type Error = Error<SPI::Error, CE::Error>;

    /// Sends one zero-padded 32-byte payload and returns to listening
    async fn send(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        if bytes.is_empty() {
            return Err(Error::Param(ParamError::EmptyBuffer));
        }
        if bytes.len() > PACKET_LEN {
            return Err(Error::Param(ParamError::BufferTooLong {
                max: PACKET_LEN,
                got: bytes.len(),
            }));
        }

        self.stop_listening()?;
        self.command(&mut [cmd::FLUSH_TX])?;

        let mut buf = [0u8; PACKET_LEN + 1];
        buf[0] = cmd::W_TX_PAYLOAD;
        buf[1..=bytes.len()].copy_from_slice(bytes);
        self.command(&mut buf)?;

        self.ce.set_high().map_err(Error::Pin)?;
        Timer::after_micros(15).await;
        self.ce.set_low().map_err(Error::Pin)?;

        let result = self.wait_tx().await;
        self.write_reg(reg::STATUS, TX_DS | MAX_RT)?;
        let result = match result {
            Ok(status) if status & MAX_RT != 0 => {
                self.command(&mut [cmd::FLUSH_TX])?;
                warn!("nRF24 send: no ACK");
                Err(Error::MaxRetries)
            }
            Ok(_) => Ok(()),
            Err(err) => Err(err),
        };
        self.start_listening()?;
        result
    }

    async fn receive(&mut self, buf: &mut [u8; PACKET_LEN]) -> Result<usize, Self::Error> {
        let mut frame = [0u8; PACKET_LEN + 1];
        frame[0] = cmd::R_RX_PAYLOAD;
        self.command(&mut frame)?;
        buf.copy_from_slice(&frame[1..]);
        self.write_reg(reg::STATUS, RX_DR)?;
        debug!("nRF24 received {:02x?}", &buf[..8]);
        Ok(PACKET_LEN)
    }

    async fn data_available(&mut self) -> Result<bool, Self::Error> {
        Ok(self.read_reg(reg::FIFO_STATUS)? & RX_EMPTY == 0)
    }
}

#[cfg(test)]
mod tests {
    use core::convert::Infallible;

    use embassy_futures::block_on;
    use embedded_hal::{
        digital::ErrorType as PinErrorType,
        spi::{ErrorType, Operation},
    };

    use super::*;

    /// Register-level model of the chip, enough for the driver's command set
    struct FakeChip {
        regs: [u8; 0x20],
        addrs: [[u8; 5]; 0x20],
        rx_fifo: heapless::Deque<[u8; PACKET_LEN], 3>,
        tx_log: heapless::Vec<[u8; PACKET_LEN], 4>,
        ack: bool,
    }

    impl FakeChip {
        fn new(ack: bool) -> Self {
            Self {
                regs: [0; 0x20],
                addrs: [[0; 5]; 0x20],
                rx_fifo: heapless::Deque::new(),
                tx_log: heapless::Vec::new(),
                ack,
            }
        }

        fn status(&self) -> u8 {
            self.regs[reg::STATUS as usize]
        }

        fn exec(&mut self, buf: &mut [u8]) {
            let op = buf[0];
            buf[0] = self.status();
            match op {
                cmd::NOP | cmd::FLUSH_TX | cmd::FLUSH_RX => {}
                cmd::W_TX_PAYLOAD => {
                    let mut payload = [0; PACKET_LEN];
                    payload.copy_from_slice(&buf[1..]);
                    self.tx_log.push(payload).unwrap();
                    self.regs[reg::STATUS as usize] |= if self.ack { TX_DS } else { MAX_RT };
                }
                cmd::R_RX_PAYLOAD => {
                    let payload = self.rx_fifo.pop_front().unwrap_or([0; PACKET_LEN]);
                    buf[1..].copy_from_slice(&payload);
                }
                op if op & 0xE0 == cmd::W_REGISTER => {
                    let r = (op & 0x1F) as usize;
                    if buf.len() == 6 {
                        self.addrs[r].copy_from_slice(&buf[1..]);
                    } else if r == reg::STATUS as usize {
                        // Write-one-to-clear
                        self.regs[r] &= !buf[1];
                    } else {
                        self.regs[r] = buf[1];
                    }
                }
                op if op & 0xE0 == cmd::R_REGISTER => {
                    let r = (op & 0x1F) as usize;
                    buf[1] = if r == reg::FIFO_STATUS as usize {
                        if self.rx_fifo.is_empty() {
                            RX_EMPTY
                        } else {
                            0
                        }
                    } else {
                        self.regs[r]
                    };
                }
                other => panic!("unexpected command {other:#x}"),
            }
        }
    }

    impl ErrorType for FakeChip {
        type Error = Infallible;
    }

    impl SpiDevice for FakeChip {
        fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Infallible> {
            for op in operations {
                match op {
                    Operation::TransferInPlace(buf) => self.exec(buf),
                    _ => panic!("driver only uses transfer_in_place"),
                }
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakePin {
        high: bool,
    }

    impl PinErrorType for FakePin {
        type Error = Infallible;
    }

    impl OutputPin for FakePin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.high = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.high = true;
            Ok(())
        }
    }

    fn radio(ack: bool) -> Nrf24<FakeChip, FakePin> {
        let mut radio = Nrf24::new(
            FakeChip::new(ack),
            FakePin::default(),
            RadioConfig::remote_board(),
        );
        // Reset value of RF_SETUP: 2 Mbps, 0 dBm
        radio.spi().regs[reg::RF_SETUP as usize] = 0x0F;
        block_on(radio.init()).unwrap();
        radio
    }

    #[test]
    fn test_init_sequence() {
        let mut radio = radio(true);
        let chip = radio.spi();
        assert_eq!(chip.regs[reg::SETUP_RETR as usize], 0x5F);
        assert_eq!(chip.regs[reg::RF_SETUP as usize], 0x07);
        assert_eq!(chip.regs[reg::EN_AA as usize], 0x3F);
        assert_eq!(chip.regs[reg::EN_RXADDR as usize], 0x03);
        assert_eq!(chip.regs[reg::RX_PW_P1 as usize], 32);
        assert_eq!(chip.regs[reg::SETUP_AW as usize], 0x03);
        assert_eq!(chip.regs[reg::RF_CH as usize], 115);
        assert_eq!(chip.regs[reg::CONFIG as usize], 0x0F);
        assert_eq!(&chip.addrs[reg::TX_ADDR as usize], b"DtoR\0");
        assert_eq!(&chip.addrs[reg::RX_ADDR_P1 as usize], b"RtoD\0");
        assert!(radio.ce.high);
    }

    #[test]
    fn test_send_pads_and_relistens() {
        let mut radio = radio(true);
        block_on(radio.send(&[1, 2, 3])).unwrap();
        let chip = radio.spi();
        assert_eq!(chip.tx_log.len(), 1);
        assert_eq!(&chip.tx_log[0][..4], &[1, 2, 3, 0]);
        assert!(chip.tx_log[0][3..].iter().all(|&b| b == 0));
        assert_eq!(chip.status() & (TX_DS | MAX_RT), 0);
        assert_eq!(chip.regs[reg::CONFIG as usize] & PRIM_RX, PRIM_RX);
    }

    #[test]
    fn test_send_without_ack() {
        let mut radio = radio(false);
        assert!(matches!(block_on(radio.send(&[7])), Err(Error::MaxRetries)));
        assert!(radio.ce.high);
    }

    #[test]
    fn test_send_rejects_bad_lengths() {
        let mut radio = radio(true);
        assert!(matches!(
            block_on(radio.send(&[])),
            Err(Error::Param(ParamError::EmptyBuffer))
        ));
        assert!(matches!(
            block_on(radio.send(&[0; 33])),
            Err(Error::Param(ParamError::BufferTooLong { max: 32, got: 33 }))
        ));
        assert!(radio.spi().tx_log.is_empty());
    }

    #[test]
    fn test_receive() {
        let mut radio = radio(true);
        assert!(!block_on(radio.data_available()).unwrap());
        let mut packet = [0u8; PACKET_LEN];
        packet[..3].copy_from_slice(&[0x01, 0xAA, 0xBB]);
        radio.spi().rx_fifo.push_back(packet).unwrap();
        assert!(block_on(radio.data_available()).unwrap());

        let mut buf = [0u8; PACKET_LEN];
        assert_eq!(block_on(radio.receive(&mut buf)).unwrap(), PACKET_LEN);
        assert_eq!(buf, packet);
        assert!(!block_on(radio.data_available()).unwrap());
    }

    #[test]
    fn test_invalid_config_touches_nothing() {
        let mut radio = Nrf24::new(
            FakeChip::new(true),
            FakePin::default(),
            RadioConfig::remote_board().with_channel(200),
        );
        assert!(matches!(
            block_on(radio.init()),
            Err(Error::Param(ParamError::RadioChannel(200)))
        ));
        assert_eq!(radio.spi().regs, [0; 0x20]);
    }
}
