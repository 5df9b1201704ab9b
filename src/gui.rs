//! A window that shows annotated frames.
//!
//! The window's event loop is pumped from the thread that calls [`Window::show`] and
//! [`Window::poll_quit`], so the whole application runs on a single thread.

mod renderer;

use std::rc::Rc;

use winit::{
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    platform::run_return::EventLoopExtRunReturn,
};

use crate::capture::{DisplayError, FrameSink, QuitReason};
use crate::image::Image;

use self::renderer::{Gpu, Renderer};

/// A native window displaying the most recent frame.
///
/// The OS window is created when the first frame is shown, at that frame's resolution. If that
/// fails, [`FrameSink::show`] reports [`DisplayError::Unavailable`].
pub struct Window {
    event_loop: EventLoop<()>,
    gpu: Rc<Gpu>,
    renderer: Option<Renderer>,
    title: String,
    quit_key: char,
    quit: Option<QuitReason>,
}

impl Window {
    /// Connects to the display server and opens the GPU.
    ///
    /// Errors returned here mean that no window can be shown at all.
    pub fn open(title: impl Into<String>, quit_key: char) -> anyhow::Result<Self> {
        let event_loop = EventLoop::new();
        let gpu = pollster::block_on(Gpu::open())?;
        Ok(Self {
            event_loop,
            gpu: Rc::new(gpu),
            renderer: None,
            title: title.into(),
            quit_key,
            quit: None,
        })
    }

    /// Processes all pending window events without blocking.
    fn pump(&mut self) {
        let Self {
            event_loop,
            renderer,
            quit_key,
            quit,
            ..
        } = self;

        event_loop.run_return(|event, _target, flow| {
            *flow = ControlFlow::Poll;
            match event {
                Event::WindowEvent { event, .. } => match event {
                    WindowEvent::CloseRequested => {
                        log::debug!("window close requested");
                        quit.get_or_insert(QuitReason::WindowClosed);
                    }
                    WindowEvent::ReceivedCharacter(c) if c == *quit_key => {
                        log::debug!("quit key '{}' pressed", c);
                        quit.get_or_insert(QuitReason::QuitKey);
                    }
                    _ => {}
                },
                Event::RedrawRequested(_) => {
                    if let Some(renderer) = renderer {
                        if let Err(e) = renderer.redraw() {
                            log::error!("failed to redraw window: {}", e);
                        }
                    }
                }
                Event::RedrawEventsCleared => *flow = ControlFlow::Exit,
                _ => {}
            }
        });
    }
}

impl FrameSink for Window {
    fn show(&mut self, image: &Image) -> Result<(), DisplayError> {
        let renderer = match &mut self.renderer {
            Some(renderer) => renderer,
            None => {
                log::debug!(
                    "creating window '{}' at {}",
                    self.title,
                    image.resolution()
                );
                let renderer = Renderer::open(
                    &*self.event_loop,
                    self.gpu.clone(),
                    &self.title,
                    image.resolution(),
                )
                .map_err(|e| DisplayError::Unavailable(e.into()))?;
                self.renderer.insert(renderer)
            }
        };

        renderer.update_texture(image.resolution(), image.data());
        renderer.window().request_redraw();
        self.pump();
        Ok(())
    }

    fn poll_quit(&mut self) -> Option<QuitReason> {
        self.pump();
        self.quit
    }
}

impl Drop for Window {
    fn drop(&mut self) {
        if self.renderer.is_some() {
            log::debug!("closing window '{}'", self.title);
        }
    }
}
