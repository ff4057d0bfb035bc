//! The lantern: one background worker runs one animation at a time off a
//! FIFO of effect requests. A shared advance flag, written only by the
//! state machine and read only by the worker, preempts the running effect
//! within one animation tick. Outside the configured active hours every
//! request other than `off` is replaced by `off`.

pub mod driver;
pub mod effects;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use chrono::{Local, Timelike};
use crossbeam_channel::{bounded, Receiver, Sender};

use crate::config::{Color, LedConfig, LedSchedule};
use driver::{create_driver, LedDriver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedEffect {
    AlwaysOn,
    Wakeup,
    Listen,
    Think,
    Speak,
    Off,
}

pub struct Lantern {
    requests: Option<Sender<LedEffect>>,
    advance: Arc<AtomicBool>,
    schedule: LedSchedule,
    last_effect: Arc<Mutex<Option<LedEffect>>>,
    worker: Option<JoinHandle<()>>,
}

impl Lantern {
    pub fn new(config: &LedConfig) -> Self {
        let driver = create_driver(config);
        Self::with_driver(driver, config.base_color, config.schedule)
    }

    pub fn with_driver(driver: Box<dyn LedDriver>, base: Color, schedule: LedSchedule) -> Self {
        let (request_tx, request_rx) = bounded(8);
        let advance = Arc::new(AtomicBool::new(false));
        let last_effect = Arc::new(Mutex::new(None));

        let worker_advance = Arc::clone(&advance);
        let worker = thread::Builder::new()
            .name("lantern".to_string())
            .spawn(move || effect_worker(driver, base, request_rx, worker_advance))
            .ok();

        if worker.is_none() {
            log::error!("Could not start LED worker; effects disabled");
        }

        let lantern = Lantern {
            requests: Some(request_tx),
            advance,
            schedule,
            last_effect,
            worker,
        };

        if lantern.is_active_now() {
            lantern.set(LedEffect::AlwaysOn);
        } else {
            lantern.set(LedEffect::Off);
        }

        lantern
    }

    /// Request an effect, preempting whatever is running. Outside active
    /// hours anything but `off` becomes `off`.
    pub fn set(&self, effect: LedEffect) {
        let effect = if effect != LedEffect::Off && !self.is_active_now() {
            LedEffect::Off
        } else {
            effect
        };

        if let Ok(mut last) = self.last_effect.lock() {
            *last = Some(effect);
        }

        self.advance.store(true, Ordering::SeqCst);
        if let Some(requests) = &self.requests {
            if requests.send(effect).is_err() {
                log::error!("LED worker is gone; dropping effect {:?}", effect);
            }
        }
    }

    /// The most recently requested effect (after schedule gating).
    pub fn last_effect(&self) -> Option<LedEffect> {
        self.last_effect.lock().ok().and_then(|last| *last)
    }

    fn is_active_now(&self) -> bool {
        is_active_hour(&self.schedule, Local::now().hour())
    }

    /// Fade out and stop the worker.
    pub fn shutdown(mut self) {
        self.set(LedEffect::Off);
        self.requests.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for Lantern {
    fn drop(&mut self) {
        self.requests.take();
    }
}

/// Hours gate with wrap-around for ranges crossing midnight.
pub fn is_active_hour(schedule: &LedSchedule, hour: u32) -> bool {
    if !schedule.enabled {
        return true;
    }

    let (start, end) = (schedule.start_hour, schedule.end_hour);
    if start <= end {
        start <= hour && hour < end
    } else {
        hour >= start || hour < end
    }
}

fn effect_worker(
    mut driver: Box<dyn LedDriver>,
    base: Color,
    requests: Receiver<LedEffect>,
    advance: Arc<AtomicBool>,
) {
    while let Ok(effect) = requests.recv() {
        advance.store(false, Ordering::SeqCst);

        // A queued request also preempts, so back-to-back requests never
        // leave a stale animation running.
        let should_stop = || advance.load(Ordering::SeqCst) || !requests.is_empty();

        match effect {
            LedEffect::AlwaysOn => effects::always_on(driver.as_mut(), base, &should_stop),
            LedEffect::Wakeup => {
                effects::wakeup(driver.as_mut(), base);
                effects::always_on(driver.as_mut(), base, &should_stop);
            }
            LedEffect::Listen => effects::listen(driver.as_mut(), base, &should_stop),
            LedEffect::Think => effects::think(driver.as_mut(), base, &should_stop),
            LedEffect::Speak => effects::speak(driver.as_mut(), base, &should_stop),
            LedEffect::Off => effects::fade_off(driver.as_mut(), base),
        }
    }

    if let Err(e) = driver.off() {
        log::debug!("LED off on shutdown failed: {}", e);
    }
    log::debug!("LED worker stopped");
}
