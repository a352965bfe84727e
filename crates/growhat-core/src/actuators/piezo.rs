use embassy_time::{Duration, Instant};
use embedded_hal::pwm::SetDutyCycle;
use log::{debug, error};

/// Length of a single beep
pub const BEEP_LENGTH: Duration = Duration::from_millis(100);

/// Start of each beep relative to the start of the burst
pub const BEEP_OFFSETS: [Duration; 3] = [
    Duration::from_millis(0),
    Duration::from_millis(300),
    Duration::from_millis(600),
];

/// Three short beeps starting at `start`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeepBurst {
    pub start: Instant,
}

impl BeepBurst {
    pub const fn new(start: Instant) -> Self {
        Self { start }
    }

    /// `(on, off)` instants of each beep
    pub fn beeps(&self) -> impl Iterator<Item = (Instant, Instant)> + '_ {
        BEEP_OFFSETS.iter().map(move |offset| {
            let on = self.start + *offset;
            (on, on + BEEP_LENGTH)
        })
    }

    pub fn is_sounding(&self, now: Instant) -> bool {
        self.beeps().any(|(on, off)| now >= on && now < off)
    }

    /// When the last beep ends
    pub fn end(&self) -> Instant {
        self.start + BEEP_OFFSETS[BEEP_OFFSETS.len() - 1] + BEEP_LENGTH
    }
}

/// Alarm buzzer on a PWM line already tuned to the alarm tone.
///
/// [`play`](Self::play) queues a burst and [`service`](Self::service), called
/// from the tick loop, switches the line on and off on schedule. Output errors
/// are logged and otherwise ignored; a broken buzzer must not stop the tick.
pub struct Piezo<D: SetDutyCycle> {
    drive: D,
    burst: Option<BeepBurst>,
    sounding: bool,
}

impl<D: SetDutyCycle> Piezo<D> {
    pub fn new(drive: D) -> Self {
        Self {
            drive,
            burst: None,
            sounding: false,
        }
    }

    pub fn play(&mut self, burst: BeepBurst, now: Instant) {
        debug!("Alarm burst");
        self.burst = Some(burst);
        self.service(now);
    }

    pub fn is_playing(&self) -> bool {
        self.burst.is_some()
    }

    pub fn service(&mut self, now: Instant) {
        let Some(burst) = self.burst else {
            return;
        };

        let sounding = burst.is_sounding(now);
        if now >= burst.end() {
            self.burst = None;
        }
        if sounding != self.sounding {
            self.switch(sounding);
        }
    }

    pub fn silence(&mut self) {
        self.burst = None;
        self.switch(false);
    }

    fn switch(&mut self, on: bool) {
        let result = if on {
            self.drive.set_duty_cycle_percent(50)
        } else {
            self.drive.set_duty_cycle_fully_off()
        };
        match result {
            Ok(()) => self.sounding = on,
            Err(e) => error!("Failed to drive piezo: {:?}", e),
        }
    }
}

impl<D: SetDutyCycle> Drop for Piezo<D> {
    fn drop(&mut self) {
        self.silence();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockDrive;

    fn ms(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    #[test]
    fn test_burst_schedule() {
        let burst = BeepBurst::new(ms(1000));
        let beeps: heapless::Vec<(Instant, Instant), 3> = burst.beeps().collect();
        assert_eq!(beeps[0], (ms(1000), ms(1100)));
        assert_eq!(beeps[1], (ms(1300), ms(1400)));
        assert_eq!(beeps[2], (ms(1600), ms(1700)));
        assert_eq!(burst.end(), ms(1700));

        assert!(burst.is_sounding(ms(1050)));
        assert!(!burst.is_sounding(ms(1100)));
        assert!(!burst.is_sounding(ms(1250)));
        assert!(burst.is_sounding(ms(1699)));
    }

    #[test]
    fn test_plays_three_beeps() {
        let drive = MockDrive::new();
        let mut piezo = Piezo::new(drive.clone());

        piezo.play(BeepBurst::new(ms(0)), ms(0));
        assert_eq!(drive.duty(), 500);

        let mut edges = 0;
        let mut last = drive.duty();
        for t in (0..=800).step_by(10) {
            piezo.service(ms(t));
            if drive.duty() != last {
                edges += 1;
                last = drive.duty();
            }
        }

        // off, on, off, on, off
        assert_eq!(edges, 5);
        assert_eq!(drive.duty(), 0);
        assert!(!piezo.is_playing());
    }

    #[test]
    fn test_silence_and_drop() {
        let drive = MockDrive::new();
        {
            let mut piezo = Piezo::new(drive.clone());
            piezo.play(BeepBurst::new(ms(0)), ms(0));
            piezo.silence();
            assert_eq!(drive.duty(), 0);

            piezo.play(BeepBurst::new(ms(1000)), ms(1000));
            assert_eq!(drive.duty(), 500);
        }
        assert_eq!(drive.duty(), 0);
    }
}
