//! LED hardware drivers behind one trait. A missing device never takes the
//! satellite down: selection falls back to the mock driver with a warning.

use std::fs::{File, OpenOptions};
use std::io::Write;

use thiserror::Error;

use crate::config::{LedConfig, LedDriverKind};

const SPI_DEVICE: &str = "/dev/spidev0.0";

#[derive(Error, Debug)]
pub enum LedError {
    #[error("LED device error: {0}")]
    Device(String),

    #[error("LED I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait LedDriver: Send {
    fn set_pixels(&mut self, colors: &[(u8, u8, u8)]) -> Result<(), LedError>;
    fn off(&mut self) -> Result<(), LedError>;
    fn pixel_count(&self) -> usize;
}

/// Select a driver for the configured type. `auto` probes APA102 hardware;
/// any open failure degrades to the mock driver.
pub fn create_driver(config: &LedConfig) -> Box<dyn LedDriver> {
    let attempt: Result<Box<dyn LedDriver>, LedError> = match config.driver_type {
        LedDriverKind::Mock => return Box::new(MockLedDriver::new(config.num_leds)),
        LedDriverKind::Apa102 | LedDriverKind::Auto => {
            Apa102Driver::open(config.num_leds, config.brightness)
                .map(|d| Box::new(d) as Box<dyn LedDriver>)
        }
        LedDriverKind::Neopixel => {
            NeoPixelDriver::open(config.num_leds).map(|d| Box::new(d) as Box<dyn LedDriver>)
        }
    };

    match attempt {
        Ok(driver) => driver,
        Err(e) => {
            log::warn!("LED driver unavailable ({}), using mock controller", e);
            Box::new(MockLedDriver::new(config.num_leds))
        }
    }
}

pub struct MockLedDriver {
    num_leds: usize,
    pixels: Vec<(u8, u8, u8)>,
}

impl MockLedDriver {
    pub fn new(num_leds: usize) -> Self {
        log::info!("Mock LED controller initialised with {} LEDs", num_leds);
        MockLedDriver {
            num_leds,
            pixels: vec![(0, 0, 0); num_leds],
        }
    }

    pub fn pixels(&self) -> &[(u8, u8, u8)] {
        &self.pixels
    }
}

impl LedDriver for MockLedDriver {
    fn set_pixels(&mut self, colors: &[(u8, u8, u8)]) -> Result<(), LedError> {
        self.pixels = colors.iter().take(self.num_leds).copied().collect();
        log::trace!("Mock LEDs set to {:?}", self.pixels);
        Ok(())
    }

    fn off(&mut self) -> Result<(), LedError> {
        self.pixels = vec![(0, 0, 0); self.num_leds];
        log::trace!("Mock LEDs off");
        Ok(())
    }

    fn pixel_count(&self) -> usize {
        self.num_leds
    }
}

/// APA102 strip over the SPI character device: a zero start frame, one
/// `0xE0 | brightness` + BGR frame per LED, then an all-ones end frame.
pub struct Apa102Driver {
    spi: File,
    num_leds: usize,
    brightness: u8,
}

impl Apa102Driver {
    pub fn open(num_leds: usize, brightness: u8) -> Result<Self, LedError> {
        let spi = OpenOptions::new()
            .write(true)
            .open(SPI_DEVICE)
            .map_err(|e| LedError::Device(format!("{}: {}", SPI_DEVICE, e)))?;

        log::info!("APA102 driver on {} ({} LEDs)", SPI_DEVICE, num_leds);

        Ok(Apa102Driver {
            spi,
            num_leds,
            brightness: brightness.min(31),
        })
    }

    fn write_frame(&mut self, colors: &[(u8, u8, u8)]) -> Result<(), LedError> {
        let mut frame = Vec::with_capacity(4 + self.num_leds * 4 + 4);
        frame.extend_from_slice(&[0x00; 4]);

        for i in 0..self.num_leds {
            let (r, g, b) = colors.get(i).copied().unwrap_or((0, 0, 0));
            frame.push(0xE0 | self.brightness);
            frame.push(b);
            frame.push(g);
            frame.push(r);
        }

        frame.extend_from_slice(&[0xFF; 4]);
        self.spi.write_all(&frame)?;
        Ok(())
    }
}

impl LedDriver for Apa102Driver {
    fn set_pixels(&mut self, colors: &[(u8, u8, u8)]) -> Result<(), LedError> {
        let colors = colors.to_vec();
        self.write_frame(&colors)
    }

    fn off(&mut self) -> Result<(), LedError> {
        self.write_frame(&[])
    }

    fn pixel_count(&self) -> usize {
        self.num_leds
    }
}

/// WS2812 strip driven over SPI, one SPI byte per colour bit. The spidev
/// clock must be configured to 6.4 MHz for the pulse widths to land in
/// spec.
pub struct NeoPixelDriver {
    spi: File,
    num_leds: usize,
}

const WS2812_ONE: u8 = 0xF8;
const WS2812_ZERO: u8 = 0xC0;
/// Latch gap, > 50 us of idle line.
const WS2812_LATCH_BYTES: usize = 48;

impl NeoPixelDriver {
    pub fn open(num_leds: usize) -> Result<Self, LedError> {
        let spi = OpenOptions::new()
            .write(true)
            .open(SPI_DEVICE)
            .map_err(|e| LedError::Device(format!("{}: {}", SPI_DEVICE, e)))?;

        log::info!("NeoPixel driver on {} ({} LEDs)", SPI_DEVICE, num_leds);

        Ok(NeoPixelDriver { spi, num_leds })
    }

    fn write_frame(&mut self, colors: &[(u8, u8, u8)]) -> Result<(), LedError> {
        let mut frame = Vec::with_capacity(self.num_leds * 24 + WS2812_LATCH_BYTES);

        for i in 0..self.num_leds {
            let (r, g, b) = colors.get(i).copied().unwrap_or((0, 0, 0));
            for byte in [g, r, b] {
                for bit in (0..8).rev() {
                    frame.push(if byte & (1 << bit) != 0 {
                        WS2812_ONE
                    } else {
                        WS2812_ZERO
                    });
                }
            }
        }

        frame.extend(std::iter::repeat(0x00).take(WS2812_LATCH_BYTES));
        self.spi.write_all(&frame)?;
        Ok(())
    }
}

impl LedDriver for NeoPixelDriver {
    fn set_pixels(&mut self, colors: &[(u8, u8, u8)]) -> Result<(), LedError> {
        let colors = colors.to_vec();
        self.write_frame(&colors)
    }

    fn off(&mut self) -> Result<(), LedError> {
        self.write_frame(&[])
    }

    fn pixel_count(&self) -> usize {
        self.num_leds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_driver_tracks_pixels() {
        let mut driver = MockLedDriver::new(3);
        driver.set_pixels(&[(255, 0, 0), (0, 255, 0), (0, 0, 255)]).unwrap();
        assert_eq!(driver.pixels(), &[(255, 0, 0), (0, 255, 0), (0, 0, 255)]);

        driver.off().unwrap();
        assert_eq!(driver.pixels(), &[(0, 0, 0); 3]);
    }

    #[test]
    fn mock_driver_truncates_to_pixel_count() {
        let mut driver = MockLedDriver::new(2);
        driver
            .set_pixels(&[(1, 1, 1), (2, 2, 2), (3, 3, 3)])
            .unwrap();
        assert_eq!(driver.pixels().len(), 2);
    }

    #[test]
    fn mock_config_selects_mock() {
        let config = LedConfig {
            driver_type: LedDriverKind::Mock,
            ..Default::default()
        };
        let driver = create_driver(&config);
        assert_eq!(driver.pixel_count(), config.num_leds);
    }
}
