use airdraw::capture::CaptureLoop;
use airdraw::config::Config;
use airdraw::gui::Window;
use airdraw::hand::detection::HandLandmarker;
use airdraw::webcam::Webcam;

fn main() -> anyhow::Result<()> {
    airdraw::init_logger!();

    let config = Config::from_env()?;

    let mut landmarker = HandLandmarker::load(&config.hand_model)?;
    landmarker.set_presence_threshold(config.presence_threshold);
    landmarker.set_max_hands(config.max_hands);

    let window = Window::open("airdraw", config.quit_key)?;
    let webcam = Webcam::open(config.webcam_options())?;

    let mut capture =
        CaptureLoop::new(webcam, landmarker, window).with_options(config.capture_options());
    capture.run()?;
    Ok(())
}
