use super::artifact::DialplanArtifact;
use super::instruction::{Block, Instruction};

/// Formats a complete `DialplanArtifact` into a human-readable listing for debugging.
pub fn visualize_artifact(artifact: &DialplanArtifact) -> String {
    let mut output = format!(
        "======== DIALPLAN for Flow: {} (v{}) ========\n",
        artifact.flow_id, artifact.format_version
    );
    output.push_str(&format!(
        "root: {}  language: {}  fingerprint: {}\n",
        artifact.root_menu, artifact.default_language, artifact.fingerprint
    ));

    output.push_str("\n--- ENTRY ---\n");
    format_block(&mut output, &artifact.entry);

    for menu in artifact.menus.values() {
        output.push_str(&format!(
            "\n--- MENU {} (prompt {}, {}s, {} retries) ---\n",
            menu.id, menu.prompt, menu.timeout_sec, menu.max_retries
        ));
        for block in [&menu.entry, &menu.present, &menu.listen, &menu.reprompt] {
            format_block(&mut output, block);
        }
        for block in menu.options.values() {
            format_block(&mut output, block);
        }
        for block in [&menu.timeout, &menu.invalid, &menu.fallback] {
            format_block(&mut output, block);
        }
    }

    output.push_str("\n--- AFTER HOURS ---\n");
    format_block(&mut output, &artifact.after_hours);

    output.push_str("\n================ END OF DIALPLAN ================\n");
    output
}

fn format_block(output: &mut String, block: &Block) {
    output.push_str(&format!("{}:\n", block.label));
    for (i, instruction) in block.instructions.iter().enumerate() {
        let op = match instruction {
            // Jumps show the target block.
            Instruction::Goto(target) => format!("{:<20} -> {}", "Goto", target),
            Instruction::Dispatch(terminal) => {
                format!("{:<20} -> {}", "Dispatch", terminal.to_action())
            }
            other => format!("{:?}", other),
        };
        output.push_str(&format!("  {:04}: {}\n", i, op));
    }
}
