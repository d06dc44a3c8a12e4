use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result, anyhow, bail};

use crate::{model_download::default_handpose_estimator_model_path, profile::DEFAULT_PROFILE_NAME};

pub const USAGE: &str = "\
usage: wave-vision [options]

  --profile <name>        parameter profile to use (default: Default)
  --profiles <path>       profile store file (default: <config dir>/wave-vision/profiles.json)
  --camera <index>        camera to open, overrides the profile
  --image <path>          feed a still image instead of the camera
  --model <path>          hand-pose ONNX model (downloaded when missing)
  --smoothing <alpha>     smoothing factor in (0, 1]
  --pinch <distance>      pinch threshold in normalized frame units
  --sensitivity <factor>  cursor gain around the frame center
  --fps <n>               control loop rate (default: 30)
  --duration <seconds>    stop after this long
  --dry-run               log pointer commands instead of sending them
  --list-profiles         print stored profiles and exit
  --save-profile <name>   store the effective settings under <name> and exit
  --delete-profile <name> remove a stored profile and exit
  --help                  show this message";

const DEFAULT_FPS: u32 = 30;

#[derive(Clone, Debug, PartialEq)]
pub struct Options {
    pub profile: String,
    pub profiles_path: Option<PathBuf>,
    pub camera: Option<u32>,
    pub image: Option<PathBuf>,
    pub model: PathBuf,
    pub smoothing: Option<f32>,
    pub pinch: Option<f32>,
    pub sensitivity: Option<f32>,
    pub fps: u32,
    pub duration: Option<Duration>,
    pub dry_run: bool,
    pub list_profiles: bool,
    pub save_profile: Option<String>,
    pub delete_profile: Option<String>,
    pub help: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            profile: DEFAULT_PROFILE_NAME.to_string(),
            profiles_path: None,
            camera: None,
            image: None,
            model: default_handpose_estimator_model_path(),
            smoothing: None,
            pinch: None,
            sensitivity: None,
            fps: DEFAULT_FPS,
            duration: None,
            dry_run: false,
            list_profiles: false,
            save_profile: None,
            delete_profile: None,
            help: false,
        }
    }
}

impl Options {
    pub fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut options = Options::default();
        let mut args = args.into_iter();

        while let Some(flag) = args.next() {
            let mut value = || {
                args.next()
                    .ok_or_else(|| anyhow!("{flag} expects a value"))
            };
            match flag.as_str() {
                "--profile" => options.profile = value()?,
                "--profiles" => options.profiles_path = Some(value()?.into()),
                "--camera" => options.camera = Some(parse_number(&flag, &value()?)?),
                "--image" => options.image = Some(value()?.into()),
                "--model" => options.model = value()?.into(),
                "--smoothing" => options.smoothing = Some(parse_number(&flag, &value()?)?),
                "--pinch" => options.pinch = Some(parse_number(&flag, &value()?)?),
                "--sensitivity" => options.sensitivity = Some(parse_number(&flag, &value()?)?),
                "--fps" => {
                    let fps: u32 = parse_number(&flag, &value()?)?;
                    if fps == 0 {
                        bail!("--fps must be at least 1");
                    }
                    options.fps = fps;
                }
                "--duration" => {
                    let secs: f64 = parse_number(&flag, &value()?)?;
                    options.duration = Some(
                        Duration::try_from_secs_f64(secs)
                            .map_err(|err| anyhow!("invalid --duration {secs}: {err}"))?,
                    );
                }
                "--dry-run" => options.dry_run = true,
                "--list-profiles" => options.list_profiles = true,
                "--save-profile" => options.save_profile = Some(value()?),
                "--delete-profile" => options.delete_profile = Some(value()?),
                "--help" | "-h" => options.help = true,
                other => bail!("unknown argument {other:?}\n\n{USAGE}"),
            }
        }

        Ok(options)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps.max(1) as f64)
    }
}

fn parse_number<T>(flag: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse()
        .with_context(|| format!("invalid value {raw:?} for {flag}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Options> {
        Options::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn no_arguments_gives_defaults() {
        let options = parse(&[]).unwrap();
        assert_eq!(options, Options::default());
        assert_eq!(options.profile, DEFAULT_PROFILE_NAME);
        assert_eq!(options.tick_interval(), Duration::from_secs_f64(1.0 / 30.0));
    }

    #[test]
    fn flags_and_values_are_read() {
        let options = parse(&[
            "--profile",
            "desk",
            "--camera",
            "2",
            "--pinch",
            "0.04",
            "--duration",
            "1.5",
            "--dry-run",
            "--save-profile",
            "desk-2",
        ])
        .unwrap();

        assert_eq!(options.profile, "desk");
        assert_eq!(options.camera, Some(2));
        assert_eq!(options.pinch, Some(0.04));
        assert_eq!(options.duration, Some(Duration::from_millis(1500)));
        assert!(options.dry_run);
        assert_eq!(options.save_profile.as_deref(), Some("desk-2"));
    }

    #[test]
    fn bad_input_is_rejected() {
        assert!(parse(&["--camera"]).is_err());
        assert!(parse(&["--camera", "front"]).is_err());
        assert!(parse(&["--fps", "0"]).is_err());
        assert!(parse(&["--duration", "-1"]).is_err());
        assert!(parse(&["--bogus"]).is_err());
    }
}
