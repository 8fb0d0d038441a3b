//! Notifications from the provisioning state machine to the application

use improv_proto::ErrorCode;

/// Called synchronously while a command is being handled.
///
/// Both methods default to doing nothing; `()` is the no-op observer.
pub trait Observer {
    /// An error was reported to the host
    fn on_error(&mut self, _error: ErrorCode) {}

    /// The device joined the network it was given
    fn on_connected(&mut self, _ssid: &str, _password: &str) {}
}

impl Observer for () {}

impl<O: Observer + ?Sized> Observer for &mut O {
    fn on_error(&mut self, error: ErrorCode) {
        (**self).on_error(error)
    }

    fn on_connected(&mut self, ssid: &str, password: &str) {
        (**self).on_connected(ssid, password)
    }
}

impl<O: Observer + ?Sized> Observer for Box<O> {
    fn on_error(&mut self, error: ErrorCode) {
        (**self).on_error(error)
    }

    fn on_connected(&mut self, ssid: &str, password: &str) {
        (**self).on_connected(ssid, password)
    }
}

/// Observer built from two closures
pub struct FnObserver<E, C> {
    on_error: E,
    on_connected: C,
}

impl<E, C> FnObserver<E, C>
where
    E: FnMut(ErrorCode),
    C: FnMut(&str, &str),
{
    pub fn new(on_error: E, on_connected: C) -> Self {
        Self { on_error, on_connected }
    }
}

impl<E, C> Observer for FnObserver<E, C>
where
    E: FnMut(ErrorCode),
    C: FnMut(&str, &str),
{
    fn on_error(&mut self, error: ErrorCode) {
        (self.on_error)(error)
    }

    fn on_connected(&mut self, ssid: &str, password: &str) {
        (self.on_connected)(ssid, password)
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;

    #[derive(Debug, Default)]
    pub struct Recorder {
        pub errors: Vec<ErrorCode>,
        pub connected: Vec<(String, String)>,
    }

    impl Observer for Recorder {
        fn on_error(&mut self, error: ErrorCode) {
            self.errors.push(error);
        }

        fn on_connected(&mut self, ssid: &str, password: &str) {
            self.connected.push((ssid.to_string(), password.to_string()));
        }
    }
}
