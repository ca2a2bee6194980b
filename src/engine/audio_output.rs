use crate::engine::playback::{ActivePlayback, AudioOutput, FinishedCallback, PcmClip};
use crate::error::PlaybackError;

/// Output for builds without the `audio` feature: there is never a device.
#[derive(Debug, Default)]
pub struct SilentOutput;

impl AudioOutput for SilentOutput {
    fn start(
        &mut self,
        _clip: PcmClip,
        _on_finished: FinishedCallback,
    ) -> Result<Box<dyn ActivePlayback>, PlaybackError> {
        Err(PlaybackError::NoOutputDevice)
    }
}

#[cfg(feature = "audio")]
pub fn default_output() -> Box<dyn AudioOutput> {
    Box::new(cpal_output::CpalOutput)
}

#[cfg(not(feature = "audio"))]
pub fn default_output() -> Box<dyn AudioOutput> {
    Box::new(SilentOutput)
}

/// Fills interleaved `data` from mono `samples`, stepping `position` by `step`
/// source samples per frame. Returns true once the clip is exhausted.
#[cfg_attr(not(feature = "audio"), allow(dead_code))]
fn render_frames<T: Copy>(
    data: &mut [T],
    channels: usize,
    samples: &[f32],
    position: &mut f64,
    step: f64,
    convert: impl Fn(f32) -> T,
) -> bool {
    for frame in data.chunks_mut(channels.max(1)) {
        let value = samples.get(*position as usize).copied().unwrap_or(0.0);
        frame.fill(convert(value));
        *position += step;
    }
    *position as usize >= samples.len()
}

#[cfg(feature = "audio")]
mod cpal_output {
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use cpal::{FromSample, SampleFormat, SizedSample};
    use tracing::warn;

    use super::*;

    /// Plays on the default output device, resampling from the clip rate.
    pub struct CpalOutput;

    struct CpalPlayback {
        stream: Option<cpal::Stream>,
    }

    fn build_stream<T>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        clip: PcmClip,
        on_finished: FinishedCallback,
    ) -> Result<cpal::Stream, PlaybackError>
    where
        T: SizedSample + FromSample<f32>,
    {
        let channels = usize::from(config.channels.max(1));
        let step = f64::from(clip.sample_rate) / f64::from(config.sample_rate.0.max(1));
        let samples = clip.samples;
        let mut position = 0.0_f64;
        let mut on_finished = Some(on_finished);

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let finished = render_frames(data, channels, &samples, &mut position, step, |v| {
                        T::from_sample(v)
                    });
                    if finished {
                        if let Some(done) = on_finished.take() {
                            done();
                        }
                    }
                },
                |err| warn!(%err, "audio stream error"),
                None,
            )
            .map_err(|e| PlaybackError::Device(e.to_string()))
    }

    impl AudioOutput for CpalOutput {
        fn start(
            &mut self,
            clip: PcmClip,
            on_finished: FinishedCallback,
        ) -> Result<Box<dyn ActivePlayback>, PlaybackError> {
            let device = cpal::default_host()
                .default_output_device()
                .ok_or(PlaybackError::NoOutputDevice)?;
            let supported = device
                .default_output_config()
                .map_err(|e| PlaybackError::Device(e.to_string()))?;
            let format = supported.sample_format();
            let config = supported.config();

            let stream = match format {
                SampleFormat::F32 => build_stream::<f32>(&device, &config, clip, on_finished),
                SampleFormat::F64 => build_stream::<f64>(&device, &config, clip, on_finished),
                SampleFormat::I16 => build_stream::<i16>(&device, &config, clip, on_finished),
                SampleFormat::I32 => build_stream::<i32>(&device, &config, clip, on_finished),
                SampleFormat::U16 => build_stream::<u16>(&device, &config, clip, on_finished),
                SampleFormat::U8 => build_stream::<u8>(&device, &config, clip, on_finished),
                other => Err(PlaybackError::Device(format!(
                    "unsupported sample format {other:?}"
                ))),
            }?;

            stream
                .play()
                .map_err(|e| PlaybackError::Device(e.to_string()))?;

            Ok(Box::new(CpalPlayback {
                stream: Some(stream),
            }))
        }
    }

    impl ActivePlayback for CpalPlayback {
        fn stop(&mut self) {
            // Dropping the stream stops the callback, so no completion follows.
            if let Some(stream) = self.stream.take() {
                if let Err(err) = stream.pause() {
                    warn!(%err, "could not pause audio stream");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_duplicated_across_channels_and_converted() {
        let samples = [0.5_f32, -0.5];
        let mut data = [0_i16; 4];
        let mut position = 0.0;

        let finished = render_frames(&mut data, 2, &samples, &mut position, 1.0, |v| {
            (v * f32::from(i16::MAX)) as i16
        });

        assert!(finished);
        assert_eq!(data, [16_383, 16_383, -16_383, -16_383]);
    }

    #[test]
    fn resampling_steps_through_the_clip_and_pads_with_silence() {
        let samples = [1.0_f32, 0.25];
        let mut data = [9.0_f32; 3];
        let mut position = 0.0;

        let finished = render_frames(&mut data, 1, &samples, &mut position, 0.5, |v| v);
        assert!(!finished);
        assert_eq!(data, [1.0, 1.0, 0.25]);

        let finished = render_frames(&mut data, 1, &samples, &mut position, 0.5, |v| v);
        assert!(finished);
        assert_eq!(data, [0.25, 0.0, 0.0]);
    }
}
