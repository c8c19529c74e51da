use retiscan_model::ToastSeverity;
use tracing::info;

/// Transient visual feedback surface (the dashboard's toast/alert layer).
/// Fire-and-forget: implementations swallow their own failures.
pub trait Presenter: Send + Sync {
    fn show_toast(&self, message: &str, severity: ToastSeverity);
}

/// Audio cue playback. Best-effort: a clip that fails to play is logged
/// by the implementation and never surfaced.
pub trait SoundPlayer: Send + Sync {
    fn play(&self, clip: &str);
}

/// Toast presentation for headless runs: one structured log line per toast.
pub struct TracingPresenter;

impl Presenter for TracingPresenter {
    fn show_toast(&self, message: &str, severity: ToastSeverity) {
        info!(?severity, message, "toast");
    }
}

/// Silent player for headless and test environments.
pub struct NoopSoundPlayer;

impl SoundPlayer for NoopSoundPlayer {
    fn play(&self, _clip: &str) {}
}
