//! Trait abstraction for serial port opening to enable testing

use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tokio::io::AsyncRead;

/// Boxed byte stream produced by a successful open
pub type PortReader = Box<dyn AsyncRead + Send + Unpin>;

/// Trait for opening a serial device as a readable byte stream
#[async_trait]
pub trait PortOpener: Send + Sync {
    /// Open the device, discard residual input, and return the byte stream.
    ///
    /// Residual bytes buffered before (re)connection must never surface as a
    /// telemetry frame, so implementations clear the input buffer before
    /// handing the stream over.
    async fn open(&self, path: &str, baud_rate: u32, timeout: Duration) -> io::Result<PortReader>;
}

/// Opens real devices via tokio-serial with standard 8N1 settings
pub struct TokioPortOpener;

#[async_trait]
impl PortOpener for TokioPortOpener {
    async fn open(&self, path: &str, baud_rate: u32, timeout: Duration) -> io::Result<PortReader> {
        use tokio_serial::{SerialPort, SerialPortBuilderExt};

        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(timeout)
            .open_native_async()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

        port.clear(tokio_serial::ClearBuffer::Input)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

        Ok(Box::new(port))
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::io::{duplex, AsyncWriteExt, DuplexStream};

    /// Opener whose every attempt fails, for exercising the reconnect loop
    pub struct FailingOpener {
        pub attempts: Arc<AtomicUsize>,
    }

    impl FailingOpener {
        pub fn new() -> Self {
            Self {
                attempts: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl PortOpener for FailingOpener {
        async fn open(
            &self,
            _path: &str,
            _baud_rate: u32,
            _timeout: Duration,
        ) -> io::Result<PortReader> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(io::Error::new(io::ErrorKind::NotFound, "no such device"))
        }
    }

    /// One scripted connection: the bytes the port will yield, and whether
    /// the connection then ends (EOF) or stays open with no further data.
    pub struct Script {
        pub data: Vec<u8>,
        pub then_eof: bool,
    }

    /// Opener that serves each connection from a queue of scripts. Once the
    /// queue is empty, further opens fail like an unplugged device.
    pub struct ScriptedOpener {
        scripts: Mutex<VecDeque<Script>>,
        // Write halves kept alive so open connections do not hit EOF
        held_writers: Mutex<Vec<DuplexStream>>,
        pub attempts: Arc<AtomicUsize>,
    }

    impl ScriptedOpener {
        pub fn new(scripts: Vec<Script>) -> Self {
            Self {
                scripts: Mutex::new(scripts.into()),
                held_writers: Mutex::new(Vec::new()),
                attempts: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl PortOpener for ScriptedOpener {
        async fn open(
            &self,
            _path: &str,
            _baud_rate: u32,
            _timeout: Duration,
        ) -> io::Result<PortReader> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let script = self
                .scripts
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "device gone"))?;

            let (reader, mut writer) = duplex(4096);
            writer.write_all(&script.data).await.unwrap();
            if script.then_eof {
                drop(writer);
            } else {
                self.held_writers.lock().unwrap().push(writer);
            }
            Ok(Box::new(reader))
        }
    }
}
