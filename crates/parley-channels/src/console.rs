//! Console channel: prints chat messages to a terminal.

use std::io::Write;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{ChatChannel, SendResult};

pub struct ConsoleChannel {
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleChannel {
    pub fn stdout() -> Self {
        Self::with_writer(Box::new(std::io::stdout()))
    }

    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self { out: Mutex::new(out) }
    }
}

#[async_trait]
impl ChatChannel for ConsoleChannel {
    fn id(&self) -> &str {
        "console"
    }

    async fn send(&self, text: &str) -> anyhow::Result<SendResult> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| anyhow::anyhow!("console writer poisoned"))?;
        for line in text.lines() {
            writeln!(out, "[chat] {line}")?;
        }
        out.flush()?;
        Ok(SendResult::ok())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_prefixes_each_line() {
        let buf = Shared::default();
        let channel = ConsoleChannel::with_writer(Box::new(buf.clone()));
        let result = channel.send("Sources:\n- https://a").await.unwrap();
        assert!(result.success);
        assert_eq!(channel.max_message_length(), None);

        let printed = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert_eq!(printed, "[chat] Sources:\n[chat] - https://a\n");
    }
}
