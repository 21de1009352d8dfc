//! Contextual menu ownership.
//!
//! At most one element's menu is shown at a time. [`MenuPresenter`] records
//! which one and applies the user's choice, either directly to an owned
//! [`AnnotationSession`] or through a running actor's [`SessionHandle`].

use serde::{Deserialize, Serialize};

use crate::actor::SessionHandle;
use crate::session::AnnotationSession;
use crate::{RaterError, RaterResult, UIElement};

/// Actions offered on an element's contextual menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MenuAction {
    /// Attach or replace the element's annotation.
    Annotate {
        /// New annotation text.
        text: String,
    },
    /// Remove the element from the session.
    Delete,
}

/// Owner of the currently presented contextual menu.
#[derive(Debug, Clone, Default)]
pub struct MenuPresenter {
    current: Option<UIElement>,
}

impl MenuPresenter {
    /// Create a presenter with no menu shown.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Show the menu for `element`, dismissing any previous one.
    ///
    /// Returns the element whose menu was dismissed, if any.
    pub fn show(&mut self, element: UIElement) -> Option<UIElement> {
        let previous = self.current.replace(element);
        if let Some(ref dismissed) = previous {
            tracing::debug!("Dismissed menu for {dismissed}");
        }
        previous
    }

    /// Show the menu for the newest element under the normalized point.
    ///
    /// Returns whether a menu is now shown. A tap on empty canvas dismisses
    /// the current menu.
    pub fn show_at(&mut self, session: &AnnotationSession, x: f64, y: f64) -> bool {
        match session.element_at(x, y) {
            Some(element) => {
                self.show(element.clone());
                true
            }
            None => {
                self.dismiss();
                false
            }
        }
    }

    /// The element whose menu is shown.
    #[must_use]
    pub fn current(&self) -> Option<&UIElement> {
        self.current.as_ref()
    }

    /// Hide the menu. Returns the element it was shown for.
    pub fn dismiss(&mut self) -> Option<UIElement> {
        self.current.take()
    }

    /// Actions available for the shown element, with the annotate action
    /// pre-filled with its current text.
    #[must_use]
    pub fn actions(&self) -> Vec<MenuAction> {
        match &self.current {
            Some(element) => vec![
                MenuAction::Annotate {
                    text: element.annotation().unwrap_or_default().to_string(),
                },
                MenuAction::Delete,
            ],
            None => Vec::new(),
        }
    }

    /// Apply `action` to the shown element and dismiss the menu.
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::InvalidTransition`] if no menu is shown, or
    /// [`RaterError::ElementNotFound`] if the element has left the session.
    /// The menu stays dismissed either way.
    pub fn apply(&mut self, action: MenuAction, session: &mut AnnotationSession) -> RaterResult<()> {
        let element = self.take_target()?;
        match action {
            MenuAction::Annotate { text } => session.annotate(&element, text),
            MenuAction::Delete => {
                if session.remove_element(&element) {
                    Ok(())
                } else {
                    Err(RaterError::ElementNotFound(element.to_string()))
                }
            }
        }
    }

    /// Like [`Self::show_at`], hit testing through the session actor.
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::SessionClosed`] if the actor is gone.
    pub async fn show_at_queued(
        &mut self,
        handle: &SessionHandle,
        x: f64,
        y: f64,
    ) -> RaterResult<bool> {
        match handle.element_at(x, y).await? {
            Some(element) => {
                self.show(element);
                Ok(true)
            }
            None => {
                self.dismiss();
                Ok(false)
            }
        }
    }

    /// Like [`Self::apply`], enqueuing the change on the session actor.
    ///
    /// # Errors
    ///
    /// Same as [`Self::apply`], plus [`RaterError::SessionClosed`] if the
    /// actor is gone.
    pub async fn apply_queued(
        &mut self,
        action: MenuAction,
        handle: &SessionHandle,
    ) -> RaterResult<()> {
        let element = self.take_target()?;
        match action {
            MenuAction::Annotate { text } => handle.annotate(element, text).await,
            MenuAction::Delete => {
                let description = element.to_string();
                if handle.remove_element(element).await? {
                    Ok(())
                } else {
                    Err(RaterError::ElementNotFound(description))
                }
            }
        }
    }

    fn take_target(&mut self) -> RaterResult<UIElement> {
        self.dismiss()
            .ok_or_else(|| RaterError::InvalidTransition("no menu is shown".into()))
    }
}
