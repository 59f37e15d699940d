/// Newline-joined accumulation of console lines for the current turn. Used
/// symmetrically by the local console, the attach client, and the agent.
#[derive(Debug, Default)]
pub struct PendingInput {
    buffer: String,
    active: bool,
}

impl PendingInput {
    /// Appends one console line, joining with `\n` when a previous line is
    /// already pending. An empty first line is valid input, not absence.
    pub fn push_line(&mut self, line: &str) {
        if self.active {
            self.buffer.push('\n');
        }
        self.buffer.push_str(line);
        self.active = true;
    }

    /// Replaces the buffer with the remaining input the engine handed back
    /// for an incomplete statement.
    pub fn replace(&mut self, remaining: String) {
        self.buffer = remaining;
        self.active = true;
    }

    /// Resets to empty at the start of a new turn.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.active = false;
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// True while a statement is mid-accumulation, i.e. the console should
    /// show its continuation prompt.
    pub fn is_accumulating(&self) -> bool {
        self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_are_newline_joined() {
        let mut pending = PendingInput::default();
        pending.push_line("if (true) {");
        pending.push_line("}");
        assert_eq!(pending.text(), "if (true) {\n}");
    }

    #[test]
    fn clear_resets_for_the_next_turn() {
        let mut pending = PendingInput::default();
        pending.push_line("1+1");
        assert!(pending.is_accumulating());
        pending.clear();
        assert!(!pending.is_accumulating());
        assert_eq!(pending.text(), "");
        pending.push_line("2+2");
        assert_eq!(pending.text(), "2+2");
    }

    #[test]
    fn empty_first_line_counts_as_input() {
        let mut pending = PendingInput::default();
        pending.push_line("");
        assert!(pending.is_accumulating());
        pending.push_line("x");
        assert_eq!(pending.text(), "\nx");
    }

    #[test]
    fn replace_keeps_engine_returned_remainder() {
        let mut pending = PendingInput::default();
        pending.push_line("[1,");
        pending.replace("[1,".to_string());
        pending.push_line("2]");
        assert_eq!(pending.text(), "[1,\n2]");
    }
}
