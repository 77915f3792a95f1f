use crate::flow::{Action, MenuId, PromptId};
use crate::navigation::FailureKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A jump target inside the artifact.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Target {
    /// Menu entry with the business-hours check.
    Entry(MenuId),
    /// Plays the menu prompt and listens, with fresh retries.
    Present(MenuId),
    /// Listens without replaying the prompt, with fresh retries.
    Listen(MenuId),
    /// Plays the prompt and listens, keeping the retry counter.
    Reprompt(MenuId),
    Fallback(MenuId),
    AfterHours,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Entry(menu) => write!(f, "{}/entry", menu),
            Target::Present(menu) => write!(f, "{}/present", menu),
            Target::Listen(menu) => write!(f, "{}/listen", menu),
            Target::Reprompt(menu) => write!(f, "{}/reprompt", menu),
            Target::Fallback(menu) => write!(f, "{}/fallback", menu),
            Target::AfterHours => write!(f, "after-hours"),
        }
    }
}

/// A terminal action with every flow default already applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Terminal {
    Queue {
        queue_ref: String,
    },
    Extension {
        context: String,
        extension: String,
    },
    Voicemail {
        voicemail_box: Option<String>,
        context: Option<String>,
    },
    Hangup {
        prompt: Option<PromptId>,
    },
    Transfer {
        destination: String,
        timeout: Option<u32>,
    },
}

impl Terminal {
    /// `None` for navigational actions.
    pub fn from_action(action: &Action) -> Option<Terminal> {
        match action.clone() {
            Action::Queue { queue_ref } => Some(Terminal::Queue { queue_ref }),
            Action::Extension { context, extension } => {
                Some(Terminal::Extension { context, extension })
            }
            Action::Voicemail {
                voicemail_box,
                context,
            } => Some(Terminal::Voicemail {
                voicemail_box,
                context,
            }),
            Action::Hangup { prompt } => Some(Terminal::Hangup { prompt }),
            Action::Transfer {
                destination,
                timeout,
            } => Some(Terminal::Transfer {
                destination,
                timeout,
            }),
            Action::Menu { .. } | Action::Language { .. } | Action::Back => None,
        }
    }

    pub fn to_action(&self) -> Action {
        match self.clone() {
            Terminal::Queue { queue_ref } => Action::Queue { queue_ref },
            Terminal::Extension { context, extension } => Action::Extension { context, extension },
            Terminal::Voicemail {
                voicemail_box,
                context,
            } => Action::Voicemail {
                voicemail_box,
                context,
            },
            Terminal::Hangup { prompt } => Action::Hangup { prompt },
            Terminal::Transfer {
                destination,
                timeout,
            } => Action::Transfer {
                destination,
                timeout,
            },
        }
    }
}

/// One step of a dialplan block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Instruction {
    /// Records `menu` as the caller's current menu.
    Enter { menu: MenuId },
    /// Jumps to the after-hours block when the business is closed.
    CheckHours,
    /// Waits for input at `menu` with this many retries.
    Arm { menu: MenuId, retries: u32 },
    Play { prompt: PromptId },
    /// Suspends until the caller types or the timeout elapses.
    Listen { menu: MenuId, timeout_sec: u32 },
    SetLanguage { language: String },
    PushHistory,
    Goto(Target),
    /// Presents whatever menu is current.
    PresentCurrent,
    ListenCurrent,
    /// Returns to the previous menu, else the parent, else re-presents the current one.
    Back { check_hours: bool },
    /// Applies the retry policy: reprompt or fall back.
    Fail(FailureKind),
    /// Hands the call over. Ends the block.
    Dispatch(Terminal),
}

/// A labelled, straight-line sequence of instructions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Block {
    pub label: String,
    pub instructions: Vec<Instruction>,
}

impl Block {
    pub fn new(label: impl Into<String>, instructions: Vec<Instruction>) -> Self {
        Self {
            label: label.into(),
            instructions,
        }
    }
}
