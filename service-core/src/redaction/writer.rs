use std::io;

use tracing_subscriber::fmt::MakeWriter;

use super::SecretRedactor;

/// `MakeWriter` that redacts registered secrets out of every log line.
#[derive(Clone)]
pub struct RedactingMakeWriter<M> {
    redactor: SecretRedactor,
    inner: M,
}

impl<M> RedactingMakeWriter<M> {
    pub fn new(redactor: SecretRedactor, inner: M) -> Self {
        Self { redactor, inner }
    }
}

impl<'a, M> MakeWriter<'a> for RedactingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = RedactingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new(self.redactor.clone(), self.inner.make_writer())
    }
}

pub struct RedactingWriter<W> {
    redactor: SecretRedactor,
    inner: W,
}

impl<W> RedactingWriter<W> {
    pub fn new(redactor: SecretRedactor, inner: W) -> Self {
        Self { redactor, inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: io::Write> io::Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        let redacted = self.redactor.redact(&text);
        self.inner.write_all(redacted.as_bytes())?;
        // Report the caller's byte count; the masked line may differ in length.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[test]
    fn writes_masked_lines() {
        let redactor = SecretRedactor::new();
        redactor.register("abcde12345");

        let mut writer = RedactingWriter::new(redactor, Vec::new());
        let line = b"{\"message\":\"using token abcde12345\"}\n";
        let written = writer.write(line).unwrap();

        assert_eq!(written, line.len());
        let output = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(output, "{\"message\":\"using token abcde**********\"}\n");
    }

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn subscriber_output_is_redacted() {
        let redactor = SecretRedactor::new();
        redactor.register("second-token-0001");
        let buffer = SharedBuffer::default();
        let sink = buffer.clone();

        let subscriber = tracing_subscriber::fmt()
            .with_writer(RedactingMakeWriter::new(redactor, move || sink.clone()))
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(token = "second-token-0001", "token issued");
        });

        let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("secon**********"));
        assert!(!output.contains("second-token-0001"));
    }
}
