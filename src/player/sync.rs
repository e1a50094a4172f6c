use std::time::Instant;

/// Playback clock that advances at the playback rate.
pub struct PlaybackClock {
    start_time: Option<Instant>,
    paused_time: f64,
    offset: f64,
    rate: f64,
    is_paused: bool,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self {
            start_time: None,
            paused_time: 0.0,
            offset: 0.0,
            rate: 1.0,
            is_paused: true,
        }
    }

    /// Start or resume playback
    pub fn resume(&mut self) {
        if self.is_paused {
            self.start_time = Some(Instant::now());
            self.offset = self.paused_time;
            self.is_paused = false;
        }
    }

    pub fn pause(&mut self) {
        if !self.is_paused {
            self.paused_time = self.get_time();
            self.is_paused = true;
        }
    }

    /// Reset clock to zero. The rate is kept.
    pub fn reset(&mut self) {
        self.start_time = None;
        self.paused_time = 0.0;
        self.offset = 0.0;
        self.is_paused = true;
    }

    /// Set current playback time (for seeking)
    pub fn set_time(&mut self, time: f64) {
        if self.is_paused {
            self.paused_time = time;
        } else {
            self.start_time = Some(Instant::now());
            self.offset = time;
        }
    }

    /// Change speed without jumping: time elapsed so far keeps the old rate.
    pub fn set_rate(&mut self, rate: f64) {
        if !self.is_paused {
            self.offset = self.get_time();
            self.start_time = Some(Instant::now());
        }
        self.rate = rate;
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Get current playback time in seconds
    pub fn get_time(&self) -> f64 {
        if self.is_paused {
            self.paused_time
        } else if let Some(start) = self.start_time {
            start.elapsed().as_secs_f64() * self.rate + self.offset
        } else {
            0.0
        }
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused
    }
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new()
    }
}
