//! Asterisk `extensions.conf` rendering of a dialplan artifact.
//!
//! Contexts: the flow's entry context, one `<entry>-menu-<id>` context per menu
//! (`s` with `present`/`listen`/`reprompt` labels, one extension per option,
//! `t`, `i` and `fallback`), `<entry>-after-hours`, and `<entry>-language`.
//! The text depends only on the artifact, never on the wall clock.

use super::artifact::{DialplanArtifact, MenuBlock};
use super::instruction::{Block, Instruction, Target, Terminal};
use crate::navigation::FailureKind;
use crate::schedule::{MINUTES_PER_DAY, Schedule};
use chrono::Weekday;

type Line = (Option<String>, String);

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

pub fn render_asterisk(artifact: &DialplanArtifact) -> String {
    let renderer = Renderer { artifact };
    let mut out = String::new();
    out.push_str(&format!(
        "; IVR flow {} (tenant {})\n; format {} fingerprint {}\n",
        artifact.flow_id, artifact.tenant, artifact.format_version, artifact.fingerprint
    ));

    renderer.entry_context(&mut out);
    for menu in artifact.menus.values() {
        renderer.menu_context(&mut out, menu);
    }
    renderer.after_hours_context(&mut out);
    renderer.language_context(&mut out);
    out
}

struct Renderer<'a> {
    artifact: &'a DialplanArtifact,
}

impl Renderer<'_> {
    fn menu_context_name(&self, menu: &str) -> String {
        format!("{}-menu-{}", self.artifact.entry_context, menu)
    }

    fn after_hours_context_name(&self) -> String {
        format!("{}-after-hours", self.artifact.entry_context)
    }

    fn language_context_name(&self) -> String {
        format!("{}-language", self.artifact.entry_context)
    }

    fn entry_context(&self, out: &mut String) {
        let artifact = self.artifact;
        let mut lines: Vec<Line> = vec![
            (None, format!("NoOp(IVR {})", artifact.flow_id)),
            (None, "Answer()".to_string()),
            (None, format!("Set(IVR_DIR={})", artifact.sounds_dir)),
            (
                None,
                format!("Set(CHANNEL(language)={})", artifact.default_language),
            ),
            (None, "Set(IVR_HISTORY=)".to_string()),
        ];
        if artifact.max_call_duration > 0 {
            lines.push((
                None,
                format!("Set(TIMEOUT(absolute)={})", artifact.max_call_duration),
            ));
        }
        if artifact.recording.enabled {
            lines.push((
                None,
                format!("MixMonitor(${{UNIQUEID}}.{})", artifact.recording.format),
            ));
        }
        lines.extend(self.block(&artifact.entry, None, None));

        open_context(out, &artifact.entry_context);
        write_extension(out, "s", &lines);
    }

    fn menu_context(&self, out: &mut String, menu: &MenuBlock) {
        open_context(out, &self.menu_context_name(&menu.id));

        let mut main = vec![(None, format!("NoOp(Menu {})", menu.id))];
        main.extend(self.block(&menu.entry, None, Some(menu)));
        main.extend(self.block(&menu.present, Some("present"), Some(menu)));
        main.extend(self.block(&menu.listen, Some("listen"), Some(menu)));
        main.extend(self.block(&menu.reprompt, Some("reprompt"), Some(menu)));
        write_extension(out, "s", &main);

        for (key, block) in &menu.options {
            let mut lines = vec![(None, format!("NoOp(Option {})", key))];
            lines.extend(self.block(block, None, Some(menu)));
            write_extension(out, key, &lines);
        }
        write_extension(out, "t", &self.block(&menu.timeout, None, Some(menu)));
        write_extension(out, "i", &self.block(&menu.invalid, None, Some(menu)));
        write_extension(out, "fallback", &self.block(&menu.fallback, None, Some(menu)));
    }

    fn after_hours_context(&self, out: &mut String) {
        open_context(out, &self.after_hours_context_name());
        let mut lines = vec![(None, "NoOp(After hours)".to_string())];
        lines.extend(self.block(&self.artifact.after_hours, None, None));
        write_extension(out, "s", &lines);
    }

    /// Offers the declared languages on keys 1..n, then enters the root menu.
    fn language_context(&self, out: &mut String) {
        let artifact = self.artifact;
        open_context(out, &self.language_context_name());
        write_extension(
            out,
            "s",
            &[
                (None, "NoOp(Language selection)".to_string()),
                (None, "WaitExten(10)".to_string()),
            ],
        );
        let root = self.menu_context_name(&artifact.root_menu);
        for (idx, language) in artifact.languages.iter().enumerate() {
            write_extension(
                out,
                &(idx + 1).to_string(),
                &[
                    (None, format!("Set(CHANNEL(language)={})", language.code)),
                    (None, format!("Goto({},s,1)", root)),
                ],
            );
        }
        write_extension(
            out,
            "t",
            &[
                (
                    None,
                    format!("Set(CHANNEL(language)={})", artifact.default_language),
                ),
                (None, format!("Goto({},s,1)", root)),
            ],
        );
        write_extension(
            out,
            "i",
            &[(None, format!("Goto({},s,1)", self.language_context_name()))],
        );
    }

    fn block(&self, block: &Block, label: Option<&str>, menu: Option<&MenuBlock>) -> Vec<Line> {
        let mut lines: Vec<Line> = block
            .instructions
            .iter()
            .flat_map(|instruction| self.instruction(instruction, menu))
            .collect();
        if let (Some(label), Some(first)) = (label, lines.first_mut()) {
            first.0 = Some(label.to_string());
        }
        lines
    }

    fn goto(&self, target: &Target) -> String {
        match target {
            Target::Entry(menu) => format!("Goto({},s,1)", self.menu_context_name(menu)),
            Target::Present(menu) => format!("Goto({},s,present)", self.menu_context_name(menu)),
            Target::Listen(menu) => format!("Goto({},s,listen)", self.menu_context_name(menu)),
            Target::Reprompt(menu) => format!("Goto({},s,reprompt)", self.menu_context_name(menu)),
            Target::Fallback(menu) => format!("Goto({},fallback,1)", self.menu_context_name(menu)),
            Target::AfterHours => format!("Goto({},s,1)", self.after_hours_context_name()),
        }
    }

    fn instruction(&self, instruction: &Instruction, menu: Option<&MenuBlock>) -> Vec<Line> {
        let plain = |app: String| vec![(None, app)];
        let dynamic_menu = format!("{}-menu-${{IVR_MENU}}", self.artifact.entry_context);
        match instruction {
            Instruction::Enter { menu: id } => {
                let parent = self
                    .artifact
                    .menus
                    .get(id)
                    .and_then(|m| m.parent_menu.clone())
                    .unwrap_or_default();
                vec![
                    (None, format!("Set(IVR_MENU={})", id)),
                    (None, format!("Set(IVR_PARENT={})", parent)),
                ]
            }
            Instruction::CheckHours => self.check_hours(),
            Instruction::Arm { retries, .. } => plain(format!("Set(IVR_RETRIES={})", retries)),
            Instruction::Play { prompt } => plain(format!(
                "Background(${{IVR_DIR}}/${{CHANNEL(language)}}/{})",
                prompt
            )),
            Instruction::Listen { timeout_sec, .. } => plain(format!("WaitExten({})", timeout_sec)),
            Instruction::SetLanguage { language } => {
                plain(format!("Set(CHANNEL(language)={})", language))
            }
            Instruction::PushHistory => plain("Set(PUSH(IVR_HISTORY)=${IVR_MENU})".to_string()),
            Instruction::Goto(target) => plain(self.goto(target)),
            Instruction::PresentCurrent => plain(format!("Goto({},s,present)", dynamic_menu)),
            Instruction::ListenCurrent => plain(format!("Goto({},s,listen)", dynamic_menu)),
            Instruction::Back { check_hours } => {
                let back_menu = format!("{}-menu-${{IVR_BACK}}", self.artifact.entry_context);
                let mut lines = vec![
                    (None, "Set(IVR_BACK=${POP(IVR_HISTORY)})".to_string()),
                    (
                        None,
                        "ExecIf($[\"${IVR_BACK}\" = \"\"]?Set(IVR_BACK=${IVR_PARENT}))".to_string(),
                    ),
                    (
                        None,
                        format!("GotoIf($[\"${{IVR_BACK}}\" = \"\"]?{},s,present)", dynamic_menu),
                    ),
                ];
                if *check_hours {
                    lines.push((None, format!("Goto({},s,1)", back_menu)));
                } else {
                    lines.push((None, "Set(IVR_MENU=${IVR_BACK})".to_string()));
                    lines.push((None, format!("Goto({},s,present)", back_menu)));
                }
                lines
            }
            Instruction::Fail(kind) => {
                let consumes = *kind == FailureKind::Timeout
                    || self.artifact.retry_policy.invalid_input_consumes_retry;
                let note = match kind {
                    FailureKind::Timeout => "NoOp(Timeout)",
                    FailureKind::Invalid => "NoOp(Invalid input)",
                };
                let mut lines = vec![(None, note.to_string())];
                if consumes {
                    lines.push((None, "Set(IVR_RETRIES=$[${IVR_RETRIES} - 1])".to_string()));
                    lines.push((None, "GotoIf($[${IVR_RETRIES} > 0]?s,reprompt)".to_string()));
                    lines.push((None, "Goto(fallback,1)".to_string()));
                } else {
                    lines.push((None, "Goto(s,reprompt)".to_string()));
                }
                // Failure blocks only exist inside menus.
                if menu.is_none() {
                    lines.truncate(1);
                }
                lines
            }
            Instruction::Dispatch(terminal) => self.dispatch(terminal),
        }
    }

    fn dispatch(&self, terminal: &Terminal) -> Vec<Line> {
        let apps = match terminal {
            Terminal::Queue { queue_ref } => {
                vec![format!("Queue({},tTk)", queue_ref), "Hangup()".to_string()]
            }
            Terminal::Extension { context, extension } => {
                vec![format!("Goto({},{},1)", context, extension)]
            }
            Terminal::Voicemail {
                voicemail_box,
                context,
            } => vec![
                format!(
                    "VoiceMail({}@{},u)",
                    voicemail_box.as_deref().unwrap_or("default"),
                    context.as_deref().unwrap_or(&self.artifact.tenant)
                ),
                "Hangup()".to_string(),
            ],
            Terminal::Hangup { .. } => vec!["Hangup()".to_string()],
            Terminal::Transfer {
                destination,
                timeout,
            } => vec![
                format!(
                    "Dial({},{})",
                    destination,
                    timeout.unwrap_or(crate::flow::DEFAULT_TRANSFER_TIMEOUT)
                ),
                "Hangup()".to_string(),
            ],
        };
        apps.into_iter().map(|app| (None, app)).collect()
    }

    /// `GotoIfTime` ranges are inclusive at minute granularity, so an
    /// end-exclusive `09:00-17:00` becomes `09:00-16:59`.
    fn check_hours(&self) -> Vec<Line> {
        let Some(hours) = &self.artifact.schedule else {
            return vec![(None, "NoOp(Always open)".to_string())];
        };
        let schedule = match Schedule::parse(hours) {
            Ok(schedule) => schedule,
            Err(e) => return vec![(None, format!("NoOp(Always open: {})", e))],
        };

        let mut lines = Vec::new();
        for day in WEEKDAYS {
            for interval in schedule.intervals(day) {
                let last = interval.end.min(MINUTES_PER_DAY) - 1;
                lines.push((
                    None,
                    format!(
                        "GotoIfTime({:02}:{:02}-{:02}:{:02},{},*,*,{}?open)",
                        interval.start / 60,
                        interval.start % 60,
                        last / 60,
                        last % 60,
                        day.to_string().to_lowercase(),
                        schedule.timezone().name()
                    ),
                ));
            }
        }
        lines.push((None, self.goto(&Target::AfterHours)));
        lines.push((Some("open".to_string()), "NoOp(Open)".to_string()));
        lines
    }
}

fn open_context(out: &mut String, name: &str) {
    out.push_str(&format!("\n[{}]\n", name));
}

fn write_extension(out: &mut String, name: &str, lines: &[Line]) {
    for (idx, (label, app)) in lines.iter().enumerate() {
        let priority = if idx == 0 { "1" } else { "n" };
        let label = label
            .as_deref()
            .map(|l| format!("({})", l))
            .unwrap_or_default();
        if idx == 0 {
            out.push_str(&format!("exten => {},{}{},{}\n", name, priority, label, app));
        } else {
            out.push_str(&format!(" same => {}{},{}\n", priority, label, app));
        }
    }
}
