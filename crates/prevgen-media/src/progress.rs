//! FFmpeg `-progress` output parsing.

/// Progress snapshot reported by FFmpeg.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FfmpegProgress {
    /// Current frame number
    pub frame: u64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed (1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

/// Feed one stderr line into `current`.
///
/// Returns `Some(snapshot)` at the end of each progress block, `None` for
/// lines that are not block terminators. The second tuple element tells the
/// caller whether the line was a progress key at all (non-progress lines are
/// diagnostics worth keeping).
pub(crate) fn parse_progress_line(
    line: &str,
    current: &mut FfmpegProgress,
) -> (Option<FfmpegProgress>, bool) {
    let Some((key, value)) = line.trim().split_once('=') else {
        return (None, false);
    };

    match key {
        "out_time_us" => {
            if let Ok(us) = value.parse::<i64>() {
                current.out_time_ms = us / 1000;
            }
        }
        // FFmpeg reports microseconds under this key as well
        "out_time_ms" => {
            if let Ok(us) = value.parse::<i64>() {
                current.out_time_ms = us / 1000;
            }
        }
        "frame" => {
            if let Ok(frame) = value.parse() {
                current.frame = frame;
            }
        }
        "speed" => {
            if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                current.speed = speed;
            }
        }
        "progress" => {
            current.is_complete = value == "end";
            return (Some(current.clone()), true);
        }
        "fps" | "bitrate" | "total_size" | "out_time" | "dup_frames" | "drop_frames"
        | "stream_0_0_q" => {}
        _ => return (None, false),
    }

    (None, true)
}
