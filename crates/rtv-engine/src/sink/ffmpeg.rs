use std::ffi::OsString;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdin, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;

use super::{FrameSink, StreamSink};
use crate::error::{CaptureError, CaptureResult};

/// External encoder invocation.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Encoder executable; looked up on `PATH` when not absolute.
    pub program: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub output: PathBuf,
}

impl EncoderConfig {
    pub const DEFAULT_FPS: u32 = 30;

    pub fn new(output: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            width,
            height,
            fps: Self::DEFAULT_FPS,
            output: output.into(),
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn validate(&self) -> CaptureResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(CaptureError::InvalidConfig(
                "encoder width/height must be non-zero".into(),
            ));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            return Err(CaptureError::InvalidConfig(
                "encoder width/height must be even for yuv420p input".into(),
            ));
        }
        if self.fps == 0 {
            return Err(CaptureError::InvalidConfig("encoder fps must be non-zero".into()));
        }
        Ok(())
    }

    /// Raw planar 4:2:0 on stdin, encoded file at `output`.
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "yuv420p",
            "-s",
            format!("{}x{}", self.width, self.height).as_str(),
            "-r",
            self.fps.to_string().as_str(),
            "-i",
            "pipe:0",
            "-an",
        ]
        .iter()
        .map(OsString::from)
        .collect();
        args.push(self.output.clone().into_os_string());
        args
    }
}

/// Returns true when `program -version` runs successfully.
pub fn is_program_on_path(program: &Path) -> bool {
    Command::new(program)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Most recent encoder stderr kept for error reports.
const STDERR_TAIL_BYTES: usize = 64 * 1024;

/// Streams raw planes into an encoder subprocess's stdin.
///
/// The encoder's stderr is drained on a background thread for the lifetime
/// of the process, so a chatty encoder never blocks on a full pipe.
pub struct FfmpegSink {
    config: EncoderConfig,
    child: Child,
    stream: Option<StreamSink<ChildStdin>>,
    stderr_drain: Option<JoinHandle<io::Result<Vec<u8>>>>,
    frames: u64,
    bytes: u64,
}

impl FfmpegSink {
    /// Deletes any existing file at `config.output`, then spawns the encoder.
    ///
    /// Fails fast if the process cannot be started or exposes no stdin.
    pub fn open(config: EncoderConfig) -> CaptureResult<Self> {
        config.validate()?;
        remove_existing(&config.output)?;

        let mut child = Command::new(&config.program)
            .args(config.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| CaptureError::EncoderSpawn {
                program: config.program.clone(),
                source,
            })?;

        let Some(stdin) = child.stdin.take() else {
            // Do not leave a headless encoder behind.
            let _ = child.kill();
            let _ = child.wait();
            return Err(CaptureError::EncoderStdin(config.program.clone()));
        };

        let stderr_drain = child.stderr.take().map(spawn_stderr_drain);

        log::info!(
            "encoder '{}' started: {}x{} @ {} fps -> {}",
            config.program.display(),
            config.width,
            config.height,
            config.fps,
            config.output.display()
        );

        Ok(Self {
            config,
            child,
            stream: Some(StreamSink::new(stdin)),
            stderr_drain,
            frames: 0,
            bytes: 0,
        })
    }

    /// Closes stdin if still open, waits for the encoder and collects the
    /// stderr tail.
    fn close(&mut self) -> CaptureResult<(ExitStatus, String)> {
        if let Some(stream) = self.stream.take() {
            // Dropping stdin signals end of stream.
            drop(stream.into_inner()?);
        }
        let status = self.child.wait()?;
        Ok((status, self.join_stderr()))
    }

    fn join_stderr(&mut self) -> String {
        let Some(drain) = self.stderr_drain.take() else {
            return String::new();
        };
        match drain.join() {
            Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).trim().to_string(),
            Ok(Err(e)) => {
                log::warn!("failed to read encoder stderr: {e}");
                String::new()
            }
            Err(_) => {
                log::warn!("encoder stderr drain thread panicked");
                String::new()
            }
        }
    }
}

impl FrameSink for FfmpegSink {
    fn write_planes(&mut self, y: &[u8], u: &[u8], v: &[u8]) -> CaptureResult<()> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(CaptureError::EncoderStdin(self.config.program.clone()));
        };
        let source = match stream.write_planes(y, u, v) {
            Ok(()) => {
                self.frames = stream.frames_written();
                self.bytes = stream.bytes_written();
                return Ok(());
            }
            Err(CaptureError::Io(e)) => e,
            Err(e) => return Err(e),
        };

        // The encoder went away mid-stream; report why it did.
        self.stream = None;
        let status = self.child.wait()?;
        let stderr = self.join_stderr();
        log::error!("encoder write failed after {} frames ({status})", self.frames);
        Err(CaptureError::EncoderWrite {
            source,
            status: status.to_string(),
            stderr,
        })
    }

    fn frames_written(&self) -> u64 {
        self.frames
    }

    fn bytes_written(&self) -> u64 {
        self.bytes
    }

    /// Closes stdin and waits for the encoder to exit.
    fn finish(mut self) -> CaptureResult<()> {
        let (status, stderr) = self.close()?;
        if !status.success() {
            return Err(CaptureError::EncoderExit {
                status: status.to_string(),
                stderr,
            });
        }

        log::info!(
            "encoder finished: {} frames, {} bytes -> {}",
            self.frames,
            self.bytes,
            self.config.output.display()
        );
        Ok(())
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        // Not finished: close the pipe so the encoder can still finalize the file.
        if self.stream.take().is_some() {
            if let Err(e) = self.child.wait() {
                log::warn!("failed to wait for encoder: {e}");
            }
        }
        if self.stderr_drain.is_some() {
            let stderr = self.join_stderr();
            if !stderr.is_empty() {
                log::debug!("encoder stderr: {stderr}");
            }
        }
    }
}

fn spawn_stderr_drain(mut stderr: ChildStderr) -> JoinHandle<io::Result<Vec<u8>>> {
    std::thread::spawn(move || {
        let mut tail = Vec::new();
        let mut buf = [0u8; 8 * 1024];
        loop {
            match stderr.read(&mut buf) {
                Ok(0) => return Ok(tail),
                Ok(n) => push_tail(&mut tail, &buf[..n], STDERR_TAIL_BYTES),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    })
}

/// Appends `bytes` and keeps only the last `cap` bytes.
fn push_tail(tail: &mut Vec<u8>, bytes: &[u8], cap: usize) {
    tail.extend_from_slice(bytes);
    if tail.len() > cap {
        let excess = tail.len() - cap;
        tail.drain(..excess);
    }
}

fn remove_existing(path: &Path) -> CaptureResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            log::debug!("removed existing output '{}'", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn args_describe_raw_yuv420p_on_stdin() {
        let cfg = EncoderConfig::new("out/video.mp4", 800, 600);
        let args = strings(&cfg.args());

        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();
        assert_eq!(args[pos("-f") + 1], "rawvideo");
        assert_eq!(args[pos("-pix_fmt") + 1], "yuv420p");
        assert_eq!(args[pos("-s") + 1], "800x600");
        assert_eq!(args[pos("-r") + 1], "30");
        assert_eq!(args[pos("-i") + 1], "pipe:0");
        assert_eq!(args.last().unwrap(), "out/video.mp4");
    }

    #[test]
    fn odd_dimensions_are_rejected() {
        let cfg = EncoderConfig::new("x.mp4", 801, 600);
        assert!(matches!(cfg.validate(), Err(CaptureError::InvalidConfig(_))));
    }

    #[test]
    fn zero_fps_is_rejected() {
        let mut cfg = EncoderConfig::new("x.mp4", 800, 600);
        cfg.fps = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn missing_program_fails_fast_after_removing_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("stale.mp4");
        std::fs::write(&out, b"old").unwrap();

        let cfg = EncoderConfig::new(&out, 16, 16).with_program(dir.path().join("no-such-encoder"));
        let err = FfmpegSink::open(cfg).err().unwrap();

        assert!(matches!(err, CaptureError::EncoderSpawn { .. }));
        assert!(!out.exists());
    }

    #[test]
    fn remove_existing_ignores_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(remove_existing(&dir.path().join("absent.mp4")).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_reported_on_finish() {
        if !Path::new("/bin/sh").exists() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(
            dir.path(),
            "fail.sh",
            "cat > /dev/null\necho 'muxer failed' >&2\nexit 3\n",
        );

        let cfg = EncoderConfig::new(dir.path().join("out.mp4"), 4, 4).with_program(&script);
        let mut sink = FfmpegSink::open(cfg).unwrap();
        sink.write_planes(&[0; 16], &[0; 4], &[0; 4]).unwrap();
        assert_eq!(sink.frames_written(), 1);
        assert_eq!(sink.bytes_written(), 24);

        match sink.finish().unwrap_err() {
            CaptureError::EncoderExit { stderr, .. } => assert_eq!(stderr, "muxer failed"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn stream_reaches_the_subprocess_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("capture.yuv");
        // Last argument is the output path.
        let script =
            write_script(dir.path(), "sink.sh", "for last; do :; done\ncat > \"$last\"\n");

        let cfg = EncoderConfig::new(&out, 4, 2).with_program(&script);
        let mut sink = FfmpegSink::open(cfg).unwrap();
        sink.write_planes(&[1; 8], &[2; 2], &[3; 2]).unwrap();
        sink.write_planes(&[4; 8], &[5; 2], &[6; 2]).unwrap();
        sink.finish().unwrap();

        let bytes = std::fs::read(&out).unwrap();
        let mut expected = Vec::new();
        for (y, u, v) in [(1u8, 2u8, 3u8), (4, 5, 6)] {
            expected.extend(std::iter::repeat_n(y, 8));
            expected.extend(std::iter::repeat_n(u, 2));
            expected.extend(std::iter::repeat_n(v, 2));
        }
        assert_eq!(bytes, expected);
    }

    #[test]
    fn stderr_tail_keeps_the_most_recent_bytes() {
        let mut tail = Vec::new();
        push_tail(&mut tail, b"abc", 4);
        assert_eq!(tail, b"abc");
        push_tail(&mut tail, b"def", 4);
        assert_eq!(tail, b"cdef");
        push_tail(&mut tail, b"0123456789", 4);
        assert_eq!(tail, b"6789");
    }

    #[cfg(unix)]
    #[test]
    fn chatty_encoder_does_not_stall_the_stream() {
        let dir = tempfile::tempdir().unwrap();
        // Far more stderr than a pipe buffer holds, before reading any input.
        let script = write_script(
            dir.path(),
            "chatty.sh",
            "head -c 400000 /dev/zero >&2\ncat > /dev/null\n",
        );

        let cfg = EncoderConfig::new(dir.path().join("out.mp4"), 800, 600).with_program(&script);
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let result = (|| {
                let mut sink = FfmpegSink::open(cfg)?;
                let y = vec![16u8; 800 * 600];
                let uv = vec![128u8; 400 * 300];
                for _ in 0..3 {
                    sink.write_planes(&y, &uv, &uv)?;
                }
                sink.finish()
            })();
            let _ = tx.send(result.map_err(|e| e.to_string()));
        });

        let result = rx
            .recv_timeout(std::time::Duration::from_secs(30))
            .expect("encoder stream stalled");
        assert_eq!(result, Ok(()));
    }

    #[cfg(unix)]
    #[test]
    fn write_failure_carries_encoder_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "die.sh", "echo 'bad codec' >&2\nexit 1\n");

        // One frame is larger than a pipe buffer, so the write cannot land
        // before the encoder exits.
        let cfg = EncoderConfig::new(dir.path().join("out.mp4"), 256, 256).with_program(&script);
        let mut sink = FfmpegSink::open(cfg).unwrap();
        let y = vec![0u8; 256 * 256];
        let uv = vec![0u8; 128 * 128];

        let err = (0..8)
            .find_map(|_| sink.write_planes(&y, &uv, &uv).err())
            .expect("write to an exited encoder must fail");
        match err {
            CaptureError::EncoderWrite { source, stderr, .. } => {
                assert_eq!(source.kind(), io::ErrorKind::BrokenPipe);
                assert!(stderr.contains("bad codec"), "stderr was {stderr:?}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
