//! ffmpeg command lines and device-listing parsers.

use std::process::{Command, Stdio};

use anyhow::{bail, Result};
use tracing::debug;

/// Executable used for decoding, overridable with `OCRDECK_FFMPEG`.
pub fn program() -> String {
    std::env::var("OCRDECK_FFMPEG").unwrap_or_else(|_| "ffmpeg".to_string())
}

const PREAMBLE: &[&str] = &["-hide_banner", "-loglevel", "error", "-nostdin"];

/// Emit raw RGB24 frames as a PPM stream on stdout.
const PPM_OUTPUT: &[&str] = &["-an", "-pix_fmt", "rgb24", "-f", "image2pipe", "-c:v", "ppm", "-"];

fn strings<'a>(parts: &'a [&'a str]) -> impl Iterator<Item = String> + 'a {
    parts.iter().map(|s| s.to_string())
}

/// Low-latency receive of the first video stream of a network source.
///
/// 5 s I/O timeout, no reordering, at most 500 ms of demuxer delay.
pub fn stream_args(url: &str) -> Vec<String> {
    let mut args: Vec<String> = strings(PREAMBLE).collect();
    args.extend(strings(&[
        "-rw_timeout",
        "5000000",
        "-reorder_queue_size",
        "0",
        "-max_delay",
        "500000",
        "-fflags",
        "nobuffer",
        "-flags",
        "low_delay",
        "-i",
    ]));
    args.push(url.to_string());
    args.extend(strings(&["-map", "0:v:0"]));
    args.extend(strings(PPM_OUTPUT));
    args
}

/// Input address for a capture device under the given ffmpeg input format.
pub fn card_address(format: &str, device: &str) -> String {
    if format == "dshow" && !device.starts_with("video=") {
        format!("video={device}")
    } else {
        device.to_string()
    }
}

pub fn card_args(format: &str, device: &str, size: &str, fps: &str) -> Vec<String> {
    let mut args: Vec<String> = strings(PREAMBLE).collect();
    args.extend([
        "-f".to_string(),
        format.to_string(),
        "-video_size".to_string(),
        size.to_string(),
        "-framerate".to_string(),
        fps.to_string(),
        "-i".to_string(),
        card_address(format, device),
    ]);
    args.extend(strings(PPM_OUTPUT));
    args
}

/// Platform desktop grabber used for one-shot monitor captures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DesktopGrabber {
    X11 { display: String },
    Gdi,
    AvFoundation,
}

impl DesktopGrabber {
    pub fn detect() -> Self {
        if cfg!(target_os = "windows") {
            Self::Gdi
        } else if cfg!(target_os = "macos") {
            Self::AvFoundation
        } else {
            Self::X11 {
                display: std::env::var("DISPLAY").unwrap_or_else(|_| ":0".to_string()),
            }
        }
    }

    /// Fails for monitors this grabber cannot address. x11grab and gdigrab
    /// only know monitor 1, the whole virtual desktop.
    pub fn check_index(&self, index: u32) -> Result<()> {
        match self {
            Self::X11 { .. } | Self::Gdi if index > 1 => {
                bail!("monitor {index} not found (1 virtual desktop)")
            }
            _ => Ok(()),
        }
    }

    /// Arguments grabbing a single frame of monitor `index` (1-based).
    ///
    /// x11grab and gdigrab capture the whole virtual desktop; only
    /// avfoundation addresses screens individually.
    pub fn grab_args(&self, index: u32) -> Vec<String> {
        let mut args: Vec<String> = strings(PREAMBLE).collect();
        match self {
            Self::X11 { display } => {
                args.extend(strings(&["-f", "x11grab", "-i"]));
                args.push(display.clone());
            }
            Self::Gdi => args.extend(strings(&["-f", "gdigrab", "-i", "desktop"])),
            Self::AvFoundation => {
                args.extend(strings(&["-f", "avfoundation", "-i"]));
                args.push(format!("Capture screen {}", index.saturating_sub(1)));
            }
        }
        args.extend(strings(&["-frames:v", "1"]));
        args.extend(strings(PPM_OUTPUT));
        args
    }
}

/// Arguments asking ffmpeg to print the devices of an input format.
pub fn list_devices_args(format: &str) -> Vec<String> {
    let mut args: Vec<String> = strings(&["-hide_banner", "-f"]).collect();
    args.push(format.to_string());
    match format {
        "dshow" => args.extend(strings(&["-list_devices", "true", "-i", "dummy"])),
        "avfoundation" => args.extend(strings(&["-list_devices", "true", "-i", ""])),
        _ => args.extend(strings(&["-sources"])),
    }
    args
}

/// Extract video device names from ffmpeg's listing output.
pub fn parse_device_list(format: &str, output: &str) -> Vec<String> {
    match format {
        "dshow" => parse_dshow(output),
        "avfoundation" => parse_avfoundation(output),
        _ => Vec::new(),
    }
}

fn quoted(line: &str) -> Option<&str> {
    let start = line.find('"')? + 1;
    let end = start + line[start..].find('"')?;
    Some(&line[start..end]).filter(|s| !s.is_empty())
}

fn parse_dshow(output: &str) -> Vec<String> {
    let mut devices = Vec::new();
    // Older builds group devices under a header instead of tagging each line.
    let mut in_video_section = false;
    for line in output.lines() {
        if line.contains("DirectShow video devices") {
            in_video_section = true;
            continue;
        }
        if line.contains("DirectShow audio devices") {
            in_video_section = false;
            continue;
        }
        if line.contains("Alternative name") {
            continue;
        }
        let Some(name) = quoted(line) else { continue };
        let tagged_video = line.contains("(video)");
        let tagged_other = line.contains("(audio)") || line.contains("(none)");
        if tagged_video || (in_video_section && !tagged_other) {
            devices.push(name.to_string());
        }
    }
    devices
}

fn parse_avfoundation(output: &str) -> Vec<String> {
    let mut devices = Vec::new();
    let mut in_video_section = false;
    for line in output.lines() {
        if line.contains("video devices:") {
            in_video_section = true;
            continue;
        }
        if line.contains("audio devices:") {
            in_video_section = false;
            continue;
        }
        if !in_video_section {
            continue;
        }
        // "[AVFoundation indev @ 0x...] [0] FaceTime HD Camera"
        let Some(open) = line.rfind("] [") else { continue };
        let rest = &line[open + 3..];
        let Some(close) = rest.find(']') else { continue };
        if rest[..close].parse::<u32>().is_err() {
            continue;
        }
        let name = rest[close + 1..].trim();
        if !name.is_empty() {
            devices.push(name.to_string());
        }
    }
    devices
}

/// Capture devices usable with `format`. Returns an empty list when the
/// devices cannot be enumerated; callers fall back to manual entry.
pub fn list_devices(format: &str) -> Vec<String> {
    if format == "v4l2" {
        return list_v4l2_nodes();
    }
    let output = match Command::new(program())
        .args(list_devices_args(format))
        .stdin(Stdio::null())
        .output()
    {
        Ok(out) => out,
        Err(e) => {
            debug!(format, error = %e, "Device listing unavailable");
            return Vec::new();
        }
    };
    // The listing goes to stderr and ffmpeg exits non-zero on the dummy input.
    let mut text = String::from_utf8_lossy(&output.stderr).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stdout));
    parse_device_list(format, &text)
}

fn list_v4l2_nodes() -> Vec<String> {
    let Ok(entries) = std::fs::read_dir("/dev") else {
        return Vec::new();
    };
    let mut nodes: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("video"))
        })
        .map(|p| p.display().to_string())
        .collect();
    nodes.sort();
    nodes
}
