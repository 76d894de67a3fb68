#[macro_use]
extern crate clap;

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use clap::{App, Arg, ArgMatches};
use log::info;

use usbd_gen::{allocate, emit_artifacts, load, Format};

fn run(matches: &ArgMatches) -> Result<()> {
    let config_path = matches.value_of("config").unwrap_or("usb_desc.yaml");
    let source_path = matches.value_of("source").unwrap_or("usb_desc.c");
    let header_path = matches.value_of("header").unwrap_or("usb_desc.h");

    let file = File::open(config_path).with_context(|| format!("couldn't open {}", config_path))?;
    let format = match matches.value_of("format") {
        Some(format) => format.parse()?,
        None => Format::from_path(config_path),
    };
    let config = load(file, format).with_context(|| format!("couldn't parse {}", config_path))?;
    info!("loaded {}", config_path);

    let allocation = allocate(&config)?;
    if matches.is_present("summary") {
        print!("{}", allocation);
    }

    let header_name = Path::new(header_path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(header_path);
    let artifacts = emit_artifacts(&config, &allocation, header_name)?;

    std::fs::write(source_path, &artifacts.source).with_context(|| format!("couldn't write {}", source_path))?;
    std::fs::write(header_path, &artifacts.header).with_context(|| format!("couldn't write {}", header_path))?;
    println!("Generated {} and {} successfully!", source_path, header_path);
    Ok(())
}

fn main() {
    env_logger::init();
    let matches = App::new("USB Descriptor Generator")
        .version(crate_version!())
        .author("Sean Cross <sean@xobs.io>")
        .about("Generate C descriptor tables for a composite CDC / vendor USB device")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("CONFIG")
                .takes_value(true)
                .help("Device description to read (default: usb_desc.yaml)"),
        )
        .arg(
            Arg::with_name("format")
                .short("f")
                .long("format")
                .value_name("FORMAT")
                .takes_value(true)
                .possible_values(&["json", "yaml"])
                .help("Syntax of the device description (default: from the file extension)"),
        )
        .arg(
            Arg::with_name("source")
                .short("s")
                .long("source")
                .value_name("SOURCE")
                .takes_value(true)
                .help("C implementation file to write (default: usb_desc.c)"),
        )
        .arg(
            Arg::with_name("header")
                .short("H")
                .long("header")
                .value_name("HEADER")
                .takes_value(true)
                .help("C header file to write (default: usb_desc.h)"),
        )
        .arg(
            Arg::with_name("summary")
                .long("summary")
                .help("Print the endpoint and interface allocation"),
        )
        .get_matches();

    if let Err(e) = run(&matches) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
