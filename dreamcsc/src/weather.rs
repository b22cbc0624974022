/*
 * Relays observatory weather to the DREAM servers
 *
 * The relay thread waits on a condition variable rather than sleeping.
 * Changing the poll interval relays the weather immediately and restarts the
 * wait from there. Stopping the relay wakes the thread the same way.
 */

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use dreamlib::Gateway;
use dreamproto::{CommandKind, DreamResult, WeatherInfo};

/// Where the current weather comes from
pub trait WeatherSource: Send + Sync {
    fn read(&self) -> DreamResult<WeatherInfo>;
}

/// Always reports the same weather
pub struct StaticWeather(pub WeatherInfo);

impl WeatherSource for StaticWeather {
    fn read(&self) -> DreamResult<WeatherInfo> {
        Ok(self.0)
    }
}

/// Reads the weather from a JSON file that some other process keeps current
pub struct FileWeather {
    path: PathBuf,
}

impl FileWeather {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl WeatherSource for FileWeather {
    fn read(&self) -> DreamResult<WeatherInfo> {
        let file = File::open(&self.path)?;
        let weather = serde_json::from_reader(BufReader::new(file))?;
        Ok(weather)
    }
}

struct Schedule {
    expiration: Instant,
    interval: Duration,
    stopping: bool,
}

type ArcCondPair<T> = Arc<CondPair<T>>;

struct CondPair<T> {
    lock: Mutex<T>,
    cvar: Condvar,
}

impl<T> CondPair<T> {
    fn lock(&self) -> MutexGuard<'_, T> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Background thread sending setWeatherInfo to every server
pub struct WeatherRelay {
    pair: ArcCondPair<Schedule>,
    relayed: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl WeatherRelay {
    /// Start relaying every `interval`, beginning now. A zero interval
    /// relays nothing and returns `None`.
    pub fn start(
        interval: Duration,
        source: Arc<dyn WeatherSource>,
        gateway: Arc<Gateway>,
    ) -> DreamResult<Option<WeatherRelay>> {
        if interval.is_zero() {
            return Ok(None);
        }

        let pair = Arc::new(CondPair {
            lock: Mutex::new(Schedule {
                expiration: Instant::now() + interval,
                interval,
                stopping: false,
            }),
            cvar: Condvar::new(),
        });
        let relayed = Arc::new(AtomicU64::new(0));

        let thread_pair = Arc::clone(&pair);
        let thread_relayed = Arc::clone(&relayed);
        let handle = thread::Builder::new()
            .name("weather-relay".to_string())
            .spawn(move || {
                relay_loop(&thread_pair, source.as_ref(), &gateway, &thread_relayed)
            })?;

        info!("Relaying weather every {:?}", interval);
        Ok(Some(WeatherRelay {
            pair,
            relayed,
            handle: Some(handle),
        }))
    }

    /// Number of relays at least one server acknowledged
    pub fn relayed(&self) -> u64 {
        self.relayed.load(Ordering::SeqCst)
    }

    /// Reset the interval to the given value. This will result in the
    /// weather being relayed immediately.
    pub fn set_interval(&self, interval: Duration) {
        if interval.is_zero() {
            return;
        }
        let mut schedule = self.pair.lock();
        schedule.interval = interval;
        schedule.expiration = Instant::now();
        self.pair.cvar.notify_one();
    }

    pub fn stop(&mut self) {
        self.pair.lock().stopping = true;
        self.pair.cvar.notify_one();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            debug!("Weather relay stopped");
        }
    }
}

impl Drop for WeatherRelay {
    fn drop(&mut self) {
        self.stop();
    }
}

fn relay_loop(
    pair: &CondPair<Schedule>,
    source: &dyn WeatherSource,
    gateway: &Gateway,
    relayed: &AtomicU64,
) {
    loop {
        if relay_once(source, gateway) {
            relayed.fetch_add(1, Ordering::SeqCst);
        }

        let mut schedule = pair.lock();
        loop {
            if schedule.stopping {
                return;
            }
            let now = Instant::now();
            if schedule.expiration <= now {
                break;
            }
            let timeout = schedule.expiration - now;
            let (guard, _) = pair
                .cvar
                .wait_timeout(schedule, timeout)
                .unwrap_or_else(PoisonError::into_inner);
            schedule = guard;
        }

        // Calculate next expiration time
        schedule.expiration = Instant::now() + schedule.interval;
    }
}

/// Read, check and broadcast the weather once. Returns whether any server
/// accepted it.
fn relay_once(source: &dyn WeatherSource, gateway: &Gateway) -> bool {
    let weather_info = match source.read() {
        Ok(weather) => weather,
        Err(e) => {
            warn!("Could not read weather: {}", e);
            return false;
        }
    };
    if let Err(e) = weather_info.validate() {
        warn!("Not relaying weather: {}", e);
        return false;
    }

    let results = gateway.broadcast(CommandKind::SetWeatherInfo { weather_info });
    let mut accepted = false;
    for (server, result) in results {
        match result {
            Ok(_) => accepted = true,
            Err(e) => warn!("Server {} did not accept weather: {}", server, e),
        }
    }
    debug!(
        "Weather relayed: safe_observing_conditions={}",
        weather_info.safe_observing_conditions
    );
    accepted
}
