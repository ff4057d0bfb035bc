//! LED animations. Preemptible effects poll `should_stop` at least once per
//! tick; every tick is well under 200 ms.

use std::thread;
use std::time::Duration;

use rand::Rng;

use super::driver::LedDriver;
use crate::config::Color;

const ALWAYS_ON_RANGE: (f32, f32) = (0.85, 1.15);
const THINK_RANGE: (f32, f32) = (0.7, 1.3);

pub fn apply_brightness(driver: &mut dyn LedDriver, base: Color, brightness: f32) {
    let scale = |channel: u8| -> u8 {
        let value = (channel as f32 * brightness).round();
        value.min(255.0).max(0.0) as u8
    };

    let color = (scale(base.0), scale(base.1), scale(base.2));
    let colors = vec![color; driver.pixel_count()];

    if let Err(e) = driver.set_pixels(&colors) {
        log::error!("LED update failed: {}", e);
    }
}

/// Gentle random flicker around the base colour.
pub fn always_on(driver: &mut dyn LedDriver, base: Color, should_stop: &dyn Fn() -> bool) {
    let mut rng = rand::thread_rng();

    while !should_stop() {
        let flicker = rng.gen_range(ALWAYS_ON_RANGE.0..=ALWAYS_ON_RANGE.1);
        apply_brightness(driver, base, flicker);
        thread::sleep(Duration::from_millis(rng.gen_range(50..=200)));
    }
}

/// Short brightness ramp on wake; runs to completion, no stop check.
pub fn wakeup(driver: &mut dyn LedDriver, base: Color) {
    for step in 0..10 {
        let brightness = 1.0 + step as f32 / 10.0;
        apply_brightness(driver, base, brightness);
        thread::sleep(Duration::from_millis(50));
    }
}

/// Slow triangle wave while capturing speech.
pub fn listen(driver: &mut dyn LedDriver, base: Color, should_stop: &dyn Fn() -> bool) {
    let mut brightness = 1.0f32;
    let mut step = 0.05f32;

    while !should_stop() {
        brightness += step;
        if brightness >= 1.3 || brightness <= 0.7 {
            step = -step;
        }
        apply_brightness(driver, base, brightness);
        thread::sleep(Duration::from_millis(100));
    }
}

/// Rapid jitter while waiting on the core.
pub fn think(driver: &mut dyn LedDriver, base: Color, should_stop: &dyn Fn() -> bool) {
    let mut rng = rand::thread_rng();

    while !should_stop() {
        let flicker = rng.gen_range(THINK_RANGE.0..=THINK_RANGE.1);
        apply_brightness(driver, base, flicker);
        thread::sleep(Duration::from_millis(rng.gen_range(20..=100)));
    }
}

/// Fast triangle wave during playback.
pub fn speak(driver: &mut dyn LedDriver, base: Color, should_stop: &dyn Fn() -> bool) {
    let mut brightness = 1.0f32;
    let mut step = 0.1f32;

    while !should_stop() {
        brightness += step;
        if brightness >= 1.2 || brightness <= 0.8 {
            step = -step;
        }
        apply_brightness(driver, base, brightness);
        thread::sleep(Duration::from_millis(50));
    }
}

/// Ramp down to dark, then hardware off.
pub fn fade_off(driver: &mut dyn LedDriver, base: Color) {
    for step in 0..10 {
        let brightness = 1.0 - step as f32 / 10.0;
        apply_brightness(driver, base, brightness);
        thread::sleep(Duration::from_millis(50));
    }

    if let Err(e) = driver.off() {
        log::error!("LED off failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leds::driver::MockLedDriver;
    use std::cell::Cell;

    #[test]
    fn apply_brightness_clamps_channels() {
        let mut driver = MockLedDriver::new(2);
        apply_brightness(&mut driver, Color(200, 100, 0), 2.0);
        assert_eq!(driver.pixels()[0], (255, 200, 0));

        apply_brightness(&mut driver, Color(200, 100, 50), 0.0);
        assert_eq!(driver.pixels()[0], (0, 0, 0));
    }

    #[test]
    fn preemptible_effects_stop_on_signal() {
        let mut driver = MockLedDriver::new(1);
        let ticks = Cell::new(0u32);
        let stop_after_three = || {
            ticks.set(ticks.get() + 1);
            ticks.get() > 3
        };

        always_on(&mut driver, Color::default(), &stop_after_three);
        assert_eq!(ticks.get(), 4);

        ticks.set(0);
        listen(&mut driver, Color::default(), &stop_after_three);
        assert_eq!(ticks.get(), 4);

        ticks.set(0);
        think(&mut driver, Color::default(), &stop_after_three);
        assert_eq!(ticks.get(), 4);

        ticks.set(0);
        speak(&mut driver, Color::default(), &stop_after_three);
        assert_eq!(ticks.get(), 4);
    }

    #[test]
    fn immediate_stop_runs_zero_ticks() {
        let mut driver = MockLedDriver::new(1);
        always_on(&mut driver, Color::default(), &|| true);
        // No pixels written.
        assert_eq!(driver.pixels(), &[(0, 0, 0)]);
    }

    #[test]
    fn fade_off_ends_dark() {
        let mut driver = MockLedDriver::new(2);
        apply_brightness(&mut driver, Color(200, 100, 50), 1.0);
        fade_off(&mut driver, Color(200, 100, 50));
        assert_eq!(driver.pixels(), &[(0, 0, 0); 2]);
    }
}
