//! ALSA PCM backend.
//!
//! Both directions are opened in blocking mode with interleaved access,
//! signed 16-bit little-endian samples, mono, 8 kHz.  The period size is a
//! request: ALSA may round it, and reads return whatever it delivers.
//!
//! Overruns (capture) and underruns (playback) are recovered in place with
//! `snd_pcm_recover`.  The affected frame is reported as an empty read or
//! silently dropped; only errors that survive recovery reach the session.

use alsa::pcm::{Access, Format, HwParams, PCM};
use alsa::{Direction, ValueOr};
use tracing::{debug, warn};

use super::{AudioBackend, AudioError, AudioParams, CaptureDevice, PlaybackDevice, StreamDirection};

/// Opens ALSA PCM devices by name, e.g. `plughw:1,0` or `default`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlsaBackend;

impl AudioBackend for AlsaBackend {
    fn open_capture(&self, params: &AudioParams) -> Result<Box<dyn CaptureDevice>, AudioError> {
        let pcm = open_pcm(params, StreamDirection::Capture)?;
        Ok(Box::new(AlsaCapture {
            pcm,
            bytes_per_frame: params.channels as usize * 2,
            buf: vec![0u8; params.frame_bytes()],
        }))
    }

    fn open_playback(&self, params: &AudioParams) -> Result<Box<dyn PlaybackDevice>, AudioError> {
        let pcm = open_pcm(params, StreamDirection::Playback)?;
        Ok(Box::new(AlsaPlayback {
            pcm,
            bytes_per_frame: params.channels as usize * 2,
        }))
    }
}

fn open_pcm(params: &AudioParams, direction: StreamDirection) -> Result<PCM, AudioError> {
    let open_err = |e: alsa::Error| AudioError::Open {
        device: params.device.clone(),
        direction,
        reason: e.to_string(),
    };

    let alsa_dir = match direction {
        StreamDirection::Capture => Direction::Capture,
        StreamDirection::Playback => Direction::Playback,
    };
    let pcm = PCM::new(&params.device, alsa_dir, false).map_err(open_err)?;

    {
        let hwp = HwParams::any(&pcm).map_err(open_err)?;
        hwp.set_channels(u32::from(params.channels)).map_err(open_err)?;
        hwp.set_rate(params.sample_rate, ValueOr::Nearest)
            .map_err(open_err)?;
        hwp.set_format(Format::S16LE).map_err(open_err)?;
        hwp.set_access(Access::RWInterleaved).map_err(open_err)?;
        let period = hwp
            .set_period_size_near(params.period_frames as alsa::pcm::Frames, ValueOr::Nearest)
            .map_err(open_err)?;
        pcm.hw_params(&hwp).map_err(open_err)?;
        debug!(
            device = %params.device,
            %direction,
            requested = params.period_frames,
            granted = period,
            "ALSA hardware parameters applied"
        );
    }

    pcm.prepare().map_err(open_err)?;
    Ok(pcm)
}

struct AlsaCapture {
    pcm: PCM,
    bytes_per_frame: usize,
    buf: Vec<u8>,
}

impl CaptureDevice for AlsaCapture {
    fn read_frame(&mut self) -> Result<Vec<u8>, AudioError> {
        let io = self.pcm.io_bytes();
        match io.readi(&mut self.buf) {
            Ok(frames) => Ok(self.buf[..frames * self.bytes_per_frame].to_vec()),
            Err(e) => {
                warn!(error = %e, "capture overrun; recovering");
                self.pcm.try_recover(e, true).map_err(|e| AudioError::Io {
                    direction: StreamDirection::Capture,
                    reason: e.to_string(),
                })?;
                Ok(Vec::new())
            }
        }
    }
}

struct AlsaPlayback {
    pcm: PCM,
    bytes_per_frame: usize,
}

impl PlaybackDevice for AlsaPlayback {
    fn write_frame(&mut self, frame: &[u8]) -> Result<(), AudioError> {
        // A trailing partial sample cannot be played.
        let whole = frame.len() - frame.len() % self.bytes_per_frame;
        if whole == 0 {
            return Ok(());
        }
        let io = self.pcm.io_bytes();
        if let Err(e) = io.writei(&frame[..whole]) {
            warn!(error = %e, "playback underrun; dropping frame");
            self.pcm.try_recover(e, true).map_err(|e| AudioError::Io {
                direction: StreamDirection::Playback,
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }
}
