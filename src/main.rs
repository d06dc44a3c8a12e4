mod control;
mod gesture;
mod mailbox;
mod mapper;
mod model_download;
mod options;
mod params;
mod pipeline;
mod pointer;
mod profile;
mod tracker;
mod types;

use std::{sync::Arc, thread, time::Instant};

use anyhow::{Context, Result, anyhow};

use control::{ControlLoop, FrameSource, PointerSink};
use mailbox::ResultMailbox;
use options::{Options, USAGE};
use params::SharedParameters;
use pipeline::{HandLandmarker, StillImage};
use pointer::{EnigoPointer, LogPointer};
use profile::{Profile, ProfileStore};
use tracker::HandTracker;
use types::ScreenSize;

const MAX_HANDS: usize = 1;

fn main() -> Result<()> {
    env_logger::init();

    let options = Options::parse(std::env::args().skip(1))?;
    if options.help {
        println!("{USAGE}");
        return Ok(());
    }

    let mut store = match &options.profiles_path {
        Some(path) => ProfileStore::open(path.clone()),
        None => ProfileStore::open_default(),
    }?;

    if options.list_profiles {
        for profile in store.list() {
            println!(
                "{:>3}  {:<16} camera={} smoothing={} pinch={} sensitivity={}",
                profile.id.unwrap_or_default(),
                profile.name,
                profile.camera_index,
                profile.smoothing,
                profile.pinch_threshold,
                profile.sensitivity
            );
        }
        return Ok(());
    }

    if let Some(name) = &options.delete_profile {
        let id = store
            .get_by_name(name)
            .and_then(|profile| profile.id)
            .ok_or_else(|| anyhow!("no profile named {name:?}"))?;
        store.delete(id)?;
        log::info!("deleted profile {name:?}");
        return Ok(());
    }

    let profile = store
        .get_by_name(&options.profile)
        .cloned()
        .ok_or_else(|| {
            anyhow!(
                "no profile named {:?} in {}",
                options.profile,
                store.path().display()
            )
        })?;
    log::info!("using profile {:?}", profile.name);

    let params = Arc::new(SharedParameters::new(profile.parameters())?);
    apply_overrides(&params, &options)?;
    let camera_index = options.camera.unwrap_or(profile.camera_index);

    if let Some(name) = &options.save_profile {
        save_profile(&mut store, name, camera_index, &params)?;
        return Ok(());
    }

    let (sink, screen) = open_pointer(options.dry_run)?;
    log::info!("mapping onto a {}x{} screen", screen.width, screen.height);

    let mailbox = Arc::new(ResultMailbox::new());
    let tracker = HandTracker::new(screen, params.clone(), mailbox.clone());
    let landmarker = HandLandmarker::new(options.model.clone(), MAX_HANDS, tracker.into_callback())
        .context("failed to start hand landmarker")?;

    let frames = open_frame_source(&options, camera_index)?;

    let mut control = ControlLoop::new(frames, Box::new(landmarker), sink, mailbox);
    control.start();
    run(&mut control, &options);
    control.stop();

    Ok(())
}

fn apply_overrides(params: &SharedParameters, options: &Options) -> Result<()> {
    if let Some(alpha) = options.smoothing {
        params.set_smoothing_factor(alpha)?;
    }
    if let Some(threshold) = options.pinch {
        params.set_pinch_threshold(threshold)?;
    }
    if let Some(sensitivity) = options.sensitivity {
        params.set_sensitivity(sensitivity)?;
    }
    Ok(())
}

fn save_profile(
    store: &mut ProfileStore,
    name: &str,
    camera_index: u32,
    params: &SharedParameters,
) -> Result<()> {
    let mut profile = Profile::new(name, camera_index, params.snapshot());
    match store.get_by_name(name).and_then(|existing| existing.id) {
        Some(id) => {
            profile.id = Some(id);
            store.update(profile)?;
            log::info!("updated profile {name:?}");
        }
        None => {
            let id = store.create(profile)?;
            log::info!("created profile {name:?} with id {id}");
        }
    }
    Ok(())
}

fn open_pointer(dry_run: bool) -> Result<(Box<dyn PointerSink>, ScreenSize)> {
    if dry_run {
        return Ok((Box::new(LogPointer::default()), pointer::detect_screen_size(None)));
    }
    let sink = EnigoPointer::new()?;
    let screen = pointer::detect_screen_size(Some(&sink));
    Ok((Box::new(sink), screen))
}

fn open_frame_source(options: &Options, camera_index: u32) -> Result<Box<dyn FrameSource>> {
    if let Some(path) = &options.image {
        return Ok(Box::new(StillImage::open(path)?));
    }
    open_camera(camera_index)
}

#[cfg(feature = "camera-nokhwa")]
fn open_camera(camera_index: u32) -> Result<Box<dyn FrameSource>> {
    let camera = pipeline::CameraFrames::open(camera_index)
        .with_context(|| format!("failed to open camera {camera_index}"))?;
    Ok(Box::new(camera))
}

#[cfg(not(feature = "camera-nokhwa"))]
fn open_camera(_camera_index: u32) -> Result<Box<dyn FrameSource>> {
    Err(anyhow!(
        "built without camera support; pass --image or enable the camera-nokhwa feature"
    ))
}

fn run(control: &mut ControlLoop, options: &Options) {
    let interval = options.tick_interval();
    let started = Instant::now();

    loop {
        let cycle_start = Instant::now();
        let outcome = control.tick();
        log::trace!("cycle: {outcome:?}");

        if options
            .duration
            .is_some_and(|duration| started.elapsed() >= duration)
        {
            log::info!("ran for {:.1}s, stopping", started.elapsed().as_secs_f64());
            break;
        }

        if let Some(rest) = interval.checked_sub(cycle_start.elapsed()) {
            thread::sleep(rest);
        }
    }
}
