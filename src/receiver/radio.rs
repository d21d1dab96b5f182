//! nRF24L01 receiver driver.
//!
//! The driver talks to the chip through [`RegisterBus`], so it runs the same
//! against the Raspberry Pi SPI peripheral and against a fake register file.

use anyhow::{Context, Result};
use rppal::gpio::{Gpio, OutputPin};
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};

/// Address of the transmitter's writing pipe.
pub const PIPE_ADDRESS: &[u8; 5] = b"00001";
pub const MAX_PAYLOAD: usize = 32;

const SPI_CLOCK_HZ: u32 = 8_000_000;

// Registers
const CONFIG: u8 = 0x00;
const EN_AA: u8 = 0x01;
const EN_RXADDR: u8 = 0x02;
const SETUP_AW: u8 = 0x03;
const SETUP_RETR: u8 = 0x04;
const RF_CH: u8 = 0x05;
const RF_SETUP: u8 = 0x06;
const STATUS: u8 = 0x07;
const RX_ADDR_P1: u8 = 0x0B;
const FIFO_STATUS: u8 = 0x17;
const DYNPD: u8 = 0x1C;
const FEATURE: u8 = 0x1D;

// Commands
const R_REGISTER: u8 = 0x00;
const W_REGISTER: u8 = 0x20;
const R_RX_PL_WID: u8 = 0x60;
const R_RX_PAYLOAD: u8 = 0x61;
const FLUSH_TX: u8 = 0xE1;
const FLUSH_RX: u8 = 0xE2;
const NOP: u8 = 0xFF;

// Bits
const PRIM_RX: u8 = 1 << 0;
const PWR_UP: u8 = 1 << 1;
const CRCO: u8 = 1 << 2;
const EN_CRC: u8 = 1 << 3;
const RX_DR: u8 = 1 << 6;
const STATUS_IRQ_MASK: u8 = 0x70;
const RX_EMPTY: u8 = 1 << 0;
const RF_DR_LOW: u8 = 1 << 5;
const RF_PWR_MAX: u8 = 0x06;
const EN_DPL: u8 = 1 << 2;
const ERX_P1: u8 = 1 << 1;

/// Receive side of the radio as the poll loop sees it.
pub trait Radio {
    /// True when the RX FIFO holds a payload.
    fn available(&mut self) -> Result<bool>;

    /// Pop the next payload. `None` when it had to be discarded.
    fn read_payload(&mut self) -> Result<Option<Vec<u8>>>;

    fn power_down(&mut self) -> Result<()>;
}

/// SPI transfer plus the CE line.
pub trait RegisterBus {
    /// Full-duplex transfer; `buf` is sent and overwritten with the reply.
    fn transfer(&mut self, buf: &mut [u8]) -> Result<()>;

    fn set_ce(&mut self, high: bool) -> Result<()>;
}

pub struct Nrf24<B: RegisterBus> {
    bus: B,
}

impl<B: RegisterBus> Nrf24<B> {
    /// Configure the chip like the transmitter and start listening on pipe 1.
    pub fn begin(bus: B, channel: u8) -> Result<Self> {
        let mut radio = Self { bus };
        radio.bus.set_ce(false)?;

        radio.write_register(RF_SETUP, RF_DR_LOW | RF_PWR_MAX)?;
        let readback = radio.read_register(RF_SETUP)?;
        if readback != RF_DR_LOW | RF_PWR_MAX {
            anyhow::bail!(
                "nRF24L01 hardware not responding (RF_SETUP read back 0x{:02X})",
                readback
            );
        }

        radio.write_register(CONFIG, EN_CRC | CRCO)?;
        radio.write_register(SETUP_RETR, 0x5F)?;
        radio.write_register(SETUP_AW, 0x03)?;
        radio.write_register(EN_AA, 0x3F)?;
        radio.write_register(RF_CH, channel & 0x7F)?;
        radio.write_register(FEATURE, EN_DPL)?;
        radio.write_register(DYNPD, 0x3F)?;
        radio.write_registers(RX_ADDR_P1, PIPE_ADDRESS)?;
        let pipes = radio.read_register(EN_RXADDR)?;
        radio.write_register(EN_RXADDR, pipes | ERX_P1)?;

        radio.command(FLUSH_RX)?;
        radio.command(FLUSH_TX)?;
        radio.start_listening()?;

        tracing::info!("NRF24L01 initialized successfully");
        tracing::info!("Listening on channel {}", channel & 0x7F);
        Ok(radio)
    }

    fn start_listening(&mut self) -> Result<()> {
        let config = self.read_register(CONFIG)?;
        self.write_register(CONFIG, config | PWR_UP | PRIM_RX)?;
        self.write_register(STATUS, STATUS_IRQ_MASK)?;
        self.bus.set_ce(true)
    }

    fn command(&mut self, cmd: u8) -> Result<u8> {
        let mut buf = [cmd];
        self.bus.transfer(&mut buf)?;
        Ok(buf[0])
    }

    fn read_register(&mut self, reg: u8) -> Result<u8> {
        let mut buf = [R_REGISTER | reg, NOP];
        self.bus.transfer(&mut buf)?;
        Ok(buf[1])
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<()> {
        self.write_registers(reg, &[value])
    }

    fn write_registers(&mut self, reg: u8, values: &[u8]) -> Result<()> {
        let mut buf = Vec::with_capacity(values.len() + 1);
        buf.push(W_REGISTER | reg);
        buf.extend_from_slice(values);
        self.bus.transfer(&mut buf)
    }

    #[cfg(test)]
    fn into_bus(self) -> B {
        self.bus
    }
}

impl<B: RegisterBus> Radio for Nrf24<B> {
    fn available(&mut self) -> Result<bool> {
        Ok(self.read_register(FIFO_STATUS)? & RX_EMPTY == 0)
    }

    fn read_payload(&mut self) -> Result<Option<Vec<u8>>> {
        let mut width = [R_RX_PL_WID, NOP];
        self.bus.transfer(&mut width)?;
        let width = usize::from(width[1]);

        if width == 0 || width > MAX_PAYLOAD {
            tracing::warn!("Dropping corrupt payload (reported width {})", width);
            self.command(FLUSH_RX)?;
            self.write_register(STATUS, RX_DR)?;
            return Ok(None);
        }

        let mut buf = vec![NOP; width + 1];
        buf[0] = R_RX_PAYLOAD;
        self.bus.transfer(&mut buf)?;
        self.write_register(STATUS, RX_DR)?;
        buf.remove(0);
        Ok(Some(buf))
    }

    fn power_down(&mut self) -> Result<()> {
        self.bus.set_ce(false)?;
        let config = self.read_register(CONFIG)?;
        self.write_register(CONFIG, config & !PWR_UP)
    }
}

/// SPI0 and a GPIO CE line on a Raspberry Pi.
pub struct PiBus {
    spi: Spi,
    ce: OutputPin,
}

impl PiBus {
    /// `csn` picks the SPI0 chip select (CE0/CE1), `ce_pin` is a BCM number.
    pub fn open(ce_pin: u8, csn: u8) -> Result<Self> {
        let slave = match csn {
            0 => SlaveSelect::Ss0,
            1 => SlaveSelect::Ss1,
            other => anyhow::bail!("Unsupported CSN {} (expected 0 or 1)", other),
        };
        let spi = Spi::new(Bus::Spi0, slave, SPI_CLOCK_HZ, Mode::Mode0)
            .context("Failed to open SPI0")?;
        let ce = Gpio::new()
            .context("Failed to access GPIO")?
            .get(ce_pin)
            .with_context(|| format!("Failed to claim GPIO {ce_pin} for CE"))?
            .into_output_low();
        Ok(Self { spi, ce })
    }
}

impl RegisterBus for PiBus {
    fn transfer(&mut self, buf: &mut [u8]) -> Result<()> {
        let out = buf.to_vec();
        self.spi.transfer(buf, &out).context("SPI transfer failed")?;
        Ok(())
    }

    fn set_ce(&mut self, high: bool) -> Result<()> {
        if high {
            self.ce.set_high();
        } else {
            self.ce.set_low();
        }
        Ok(())
    }
}

/// Open the radio described by the receiver config.
pub fn open_pi_radio(ce_pin: u8, csn: u8, channel: u8) -> Result<Nrf24<PiBus>> {
    let bus = PiBus::open(ce_pin, csn)?;
    Nrf24::begin(bus, channel)
}
