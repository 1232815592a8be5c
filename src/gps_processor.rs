use anyhow::Result;

#[derive(Clone, Debug, PartialEq)]
pub struct CoordinateFix {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp_ms: i64,
    // meters per second
    pub speed: Option<f32>,
    // meters
    pub altitude: Option<f32>,
    // horizontal accuracy in meters
    pub accuracy: Option<f32>,
}

impl CoordinateFix {
    pub fn new(latitude: f64, longitude: f64, timestamp_ms: i64) -> Self {
        CoordinateFix {
            latitude,
            longitude,
            timestamp_ms,
            speed: None,
            altitude: None,
            accuracy: None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum ProcessResult {
    Accept = 0,
    // negative values are for ones that should not reach the recorder.
    Ignore = -1,
}

impl TryFrom<i8> for ProcessResult {
    type Error = anyhow::Error;

    fn try_from(i: i8) -> Result<Self> {
        match i {
            0 => Ok(ProcessResult::Accept),
            -1 => Ok(ProcessResult::Ignore),
            _ => bail!("invalid `ProcessResult`: {}", i),
        }
    }
}

impl ProcessResult {
    pub fn to_int(&self) -> i8 {
        *self as i8
    }
}


pub const DEFAULT_MAX_ACCURACY_M: f32 = 50.0;

// Sits between the platform location stream and the recorder. The recorder
// assumes fixes arrive in chronological order, so anything older than the
// last accepted fix is dropped here.
pub struct GpsProcessor {
    last_data: Option<CoordinateFix>,
    max_accuracy_m: f32,
}

impl GpsProcessor {
    pub fn new() -> Self {
        Self::with_max_accuracy(DEFAULT_MAX_ACCURACY_M)
    }

    pub fn with_max_accuracy(max_accuracy_m: f32) -> Self {
        GpsProcessor {
            last_data: None,
            max_accuracy_m,
        }
    }

    pub fn last_data(&self) -> Option<&CoordinateFix> {
        self.last_data.as_ref()
    }

    // Forget the last accepted fix, called when a new session starts.
    pub fn reset(&mut self) {
        self.last_data = None;
    }

    pub fn preprocess(&mut self, curr_data: &CoordinateFix) -> ProcessResult {
        let too_inaccurate = match curr_data.accuracy {
            Some(accuracy) => accuracy > self.max_accuracy_m,
            None => false,
        };

        let result = if too_inaccurate {
            ProcessResult::Ignore
        } else {
            match &self.last_data {
                None => ProcessResult::Accept,
                Some(last_data) => {
                    if curr_data.timestamp_ms < last_data.timestamp_ms {
                        // NOTE: a location update from a while ago would make
                        // the polyline jump backwards, so we just drop it.
                        ProcessResult::Ignore
                    } else {
                        ProcessResult::Accept
                    }
                }
            }
        };
        if result == ProcessResult::Accept {
            self.last_data = Some(curr_data.clone());
        }
        result
    }
}
