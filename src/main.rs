use clap::Parser;

use cloakcam::camera::{list_devices, Resolution};
use cloakcam::cli::{Args, Command};
use cloakcam::config::Config;
use cloakcam::session::{self, SessionOptions};

fn main() {
    env_logger::init();

    let args = Args::parse();

    if let Some(Command::ListCameras) = args.command {
        run_list_cameras();
        return;
    }

    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = session::setup_ctrlc_handler() {
        eprintln!("Error: failed to install Ctrl+C handler: {}", e);
        std::process::exit(1);
    }

    let registry = config.color_registry();
    let profile = registry.lookup(args.color.as_str()).clone();

    let mut camera_settings = config.camera_settings();
    if let Some(device) = args.camera {
        camera_settings.device_index = device;
    }
    if let Some((width, height)) = args.resolution {
        camera_settings.resolution = Resolution { width, height };
    }
    if let Some(fps) = args.fps {
        camera_settings.fps = fps;
    }

    let opts = SessionOptions {
        camera: camera_settings,
        warmup: config.warmup(),
        mirror: config.camera.mirror && !args.no_mirror,
        background: config.background_settings(),
        mask: config.mask_settings(),
        recorder: config.recorder_settings(),
        profile,
        show_debug: !args.no_debug,
        record: args.record,
    };

    print_banner(&opts);

    match session::run(opts) {
        Ok(()) => {
            println!("Mischief managed.");
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn run_list_cameras() {
    match list_devices() {
        Ok(devices) if devices.is_empty() => {
            println!("No cameras found.");
        }
        Ok(devices) => {
            println!("Available cameras:");
            for device in devices {
                println!("  {}", device);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_banner(opts: &SessionOptions) {
    println!("cloakcam - invisibility cloak for your webcam");
    println!();
    println!("  Cloak color:  {}", opts.profile.name.to_uppercase());
    println!(
        "  Recording:    {}",
        if opts.record { "ON" } else { "OFF" }
    );
    println!();
    println!("  q / Esc   quit");
    println!("  r         recapture the background");
    println!("  space     toggle the mask debug panel");
    println!();
}
