//! Score timing expansion.
//!
//! A [`TimingExpander`] turns raw MEI into [`ScoreElement`]s with absolute
//! onsets and durations. Expanders that sit on top of an external runtime
//! do their setup in `start` and teardown in `stop`; [`ExpanderHandle`]
//! owns the expander and makes that lifecycle explicit instead of relying on
//! first-use initialization.

use log::{debug, info, warn};
use roxmltree::{Document, Node};

use super::element::{ElementKind, ScoreElement, Tick};
use super::mei::{TimedTag, element_ids};
use super::native;
use crate::{Error, Result};

pub trait TimingExpander {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Acquire whatever the expander needs (processes, runtimes, caches).
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    /// Expand `mei` into timed elements at `ppq` ticks per quarter note.
    fn expand(&self, mei: &str, ppq: u32) -> Result<Vec<ScoreElement>>;

    /// Release everything acquired in `start`.
    fn stop(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T: TimingExpander + ?Sized> TimingExpander for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn start(&mut self) -> Result<()> {
        (**self).start()
    }

    fn expand(&self, mei: &str, ppq: u32) -> Result<Vec<ScoreElement>> {
        (**self).expand(mei, ppq)
    }

    fn stop(&mut self) -> Result<()> {
        (**self).stop()
    }
}

/// Running expander. Stopped by [`ExpanderHandle::stop`], or on drop if the
/// caller never stopped it.
pub struct ExpanderHandle<E: TimingExpander> {
    expander: E,
    running: bool,
}

impl<E: TimingExpander> ExpanderHandle<E> {
    pub fn start(mut expander: E) -> Result<Self> {
        expander.start()?;
        info!("started timing expander `{}`", expander.name());
        Ok(Self {
            expander,
            running: true,
        })
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn expand(&self, mei: &str, ppq: u32) -> Result<Vec<ScoreElement>> {
        if !self.running {
            return Err(Error::Expander(format!(
                "`{}` is not running",
                self.expander.name()
            )));
        }
        if ppq == 0 {
            return Err(Error::InvalidParameter {
                name: "ppq",
                value: "0".into(),
                reason: "must be > 0".into(),
            });
        }
        let elements = self.expander.expand(mei, ppq)?;
        debug!(
            "`{}` produced {} timed elements",
            self.expander.name(),
            elements.len()
        );
        Ok(elements)
    }

    pub fn stop(mut self) -> Result<()> {
        self.running = false;
        info!("stopping timing expander `{}`", self.expander.name());
        self.expander.stop()
    }
}

impl<E: TimingExpander> Drop for ExpanderHandle<E> {
    fn drop(&mut self) {
        if self.running {
            self.running = false;
            if let Err(e) = self.expander.stop() {
                warn!("timing expander `{}` failed to stop: {e}", self.expander.name());
            }
        }
    }
}

/// Computes timing from the MEI itself (`@dur`, `@dots`, tuplets, meter).
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeExpander;

impl TimingExpander for NativeExpander {
    fn name(&self) -> &str {
        "native"
    }

    fn expand(&self, mei: &str, ppq: u32) -> Result<Vec<ScoreElement>> {
        let doc = Document::parse(mei)?;
        Ok(native::expand_document(&doc, ppq))
    }
}

/// Reads timing that an external tool already wrote into the markup:
/// `@midi.date` / `@midi.dur` in ticks and `@pnum` for pitch.
///
/// The tick resolution is whatever the annotating tool used; `ppq` is not
/// consulted.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnnotatedExpander;

impl TimingExpander for AnnotatedExpander {
    fn name(&self) -> &str {
        "annotated"
    }

    fn expand(&self, mei: &str, _ppq: u32) -> Result<Vec<ScoreElement>> {
        let doc = Document::parse(mei)?;
        let ids = element_ids(&doc);
        let mut elements = Vec::new();

        for node in doc.descendants() {
            let Some(tag) = TimedTag::of(node) else {
                continue;
            };
            let Some(identifier) = ids.get(&node.id()).cloned() else {
                continue;
            };

            let duration = node
                .attribute("midi.dur")
                .map(|v| parse_ticks(v, "midi.dur", &identifier))
                .transpose()?;

            // Undurated elements never reach the chromagram.
            let Some(duration) = duration else {
                let onset = node
                    .attribute("midi.date")
                    .and_then(|v| parse_ticks(v, "midi.date", &identifier).ok())
                    .unwrap_or(0);
                match element_kind(tag, node, &identifier) {
                    Ok(kind) => elements.push(ScoreElement {
                        identifier,
                        kind,
                        onset,
                        duration: None,
                    }),
                    Err(e) => debug!("skipping undurated element: {e}"),
                }
                continue;
            };

            let onset = match node.attribute("midi.date") {
                Some(v) => parse_ticks(v, "midi.date", &identifier)?,
                None => {
                    return Err(Error::Expander(format!(
                        "`{identifier}` has @midi.dur but no @midi.date"
                    )));
                }
            };
            let kind = element_kind(tag, node, &identifier)?;

            elements.push(ScoreElement {
                identifier,
                kind,
                onset,
                duration: Some(duration),
            });
        }

        Ok(elements)
    }
}

fn element_kind(tag: TimedTag, node: Node, identifier: &str) -> Result<ElementKind> {
    let pitch = match tag {
        TimedTag::Rest => return Ok(ElementKind::Rest),
        TimedTag::Note => match node.attribute("pnum") {
            Some(v) => v
                .trim()
                .parse::<f64>()
                .map(|p| p as i32)
                .map_err(|_| Error::Expander(format!("`{identifier}` has invalid @pnum `{v}`")))?,
            None => native::spelled_pitch(node).ok_or_else(|| {
                Error::Expander(format!("`{identifier}` has no @pnum or spelled pitch"))
            })?,
        },
    };
    Ok(ElementKind::Note { pitch })
}

fn parse_ticks(value: &str, attr: &str, identifier: &str) -> Result<Tick> {
    match value.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v.round() as Tick),
        _ => Err(Error::Expander(format!(
            "`{identifier}` has invalid @{attr} `{value}`"
        ))),
    }
}
