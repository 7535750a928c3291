//! Editor suggestions for Graphviz layout skeletons.
//!
//! Typing `` ```dot `` on the opening line of an empty fenced block (one whose
//! next line is already the closing `` ``` ``) offers one suggestion per
//! Graphviz layout engine. Choosing one inserts a graph skeleton for that
//! engine below the fence line.

use std::fmt;
use std::sync::Arc;

/// Layout engines offered as suggestions, in display order.
pub const LAYOUT_ENGINES: [&str; 7] = ["dot", "neato", "fdp", "sfdp", "circo", "osage", "patchwork"];

const TRIGGER_PHRASE: &str = "```dot";
const CLOSING_FENCE: &str = "```";

/// Engine names starting with this prefix get a directed graph.
const DIGRAPH_PREFIX: &str = "dot";

fn engine_hints(engine: &str) -> &'static [&'static str] {
    match engine {
        "dot" => &["/*", "a -> b -> a;", "a [color=blue];", "*/"],
        "neato" => &["mode=\"major\";  // KK/sgd/hier/ipsep", "/* a -- b -- c; */"],
        "patchwork" => &["/* \"foo\" [area=100 fillcolor=gold] */"],
        _ => &[],
    }
}

/// Compose the skeleton inserted for `engine`.
///
/// ```text
/// graph n {
///     layout=neato;
///     mode="major";  // KK/sgd/hier/ipsep
///     /* a -- b -- c; */
///
/// }
/// ```
pub fn layout_skeleton(engine: &str) -> String {
    let grouping = if engine.starts_with(DIGRAPH_PREFIX) {
        "digraph"
    } else {
        "graph"
    };
    let node: String = engine.chars().take(1).collect();
    let hints = engine_hints(engine)
        .iter()
        .map(|hint| format!("    {hint}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!("{grouping} {node} {{\n    layout={engine};\n{hints}\n\n}}")
}

/// A cursor position: zero-based line and character column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    pub line: usize,
    pub ch: usize,
}

impl Position {
    pub fn new(line: usize, ch: usize) -> Self {
        Self { line, ch }
    }
}

/// The editing surface a suggestion provider reads and writes.
pub trait Editor {
    /// Text of line `line`, without its line terminator.
    fn line(&self, line: usize) -> Option<&str>;

    /// Text between two positions; empty if `to` precedes `from`.
    fn range(&self, from: Position, to: Position) -> String;

    /// Insert `text` at `at`, replacing nothing.
    fn insert(&mut self, text: &str, at: Position);

    fn line_count(&self) -> usize;
}

/// Where a suggestion session started and what has been typed since.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerInfo {
    /// Start of the trigger phrase
    pub start: Position,
    /// Cursor position when the trigger was evaluated
    pub end: Position,
    /// Text typed after the trigger phrase
    pub query: String,
}

/// Modifier keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Shift,
    Ctrl,
    Alt,
}

/// Keys the suggestion popup reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Escape,
    Up,
    Down,
}

/// A key with an optional held modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyChord {
    pub modifier: Option<Modifier>,
    pub key: Key,
}

impl KeyChord {
    pub fn new(key: Key) -> Self {
        Self {
            modifier: None,
            key,
        }
    }

    pub fn with(modifier: Modifier, key: Key) -> Self {
        Self {
            modifier: Some(modifier),
            key,
        }
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(modifier) = self.modifier {
            write!(f, "{modifier:?}+")?;
        }
        write!(f, "{:?}", self.key)
    }
}

/// An editor suggestion provider, registered with the host's editor.
pub trait EditorSuggest: Send + Sync {
    /// Decide whether suggestions should be shown at `cursor`.
    ///
    /// `active` is the trigger of the current session, if one is open.
    fn on_trigger(
        &self,
        cursor: Position,
        editor: &dyn Editor,
        active: Option<&TriggerInfo>,
    ) -> Option<TriggerInfo>;

    /// Candidates for the current session.
    fn suggestions(&self, context: &TriggerInfo) -> Vec<String>;

    /// Display text for a candidate.
    fn render_suggestion(&self, suggestion: &str) -> String;

    /// Apply the chosen candidate to the editor.
    fn select_suggestion(&self, suggestion: &str, context: &TriggerInfo, editor: &mut dyn Editor);

    /// Extra chords that confirm the highlighted suggestion, besides `Enter`.
    fn confirm_chords(&self) -> Vec<KeyChord> {
        Vec::new()
    }
}

/// Offers a skeleton per Graphviz layout engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct LayoutSuggest;

impl LayoutSuggest {
    pub fn new() -> Self {
        Self
    }
}

impl EditorSuggest for LayoutSuggest {
    fn on_trigger(
        &self,
        cursor: Position,
        editor: &dyn Editor,
        active: Option<&TriggerInfo>,
    ) -> Option<TriggerInfo> {
        let start = match active {
            Some(context) => context.start,
            None => Position::new(
                cursor.line,
                cursor.ch.checked_sub(TRIGGER_PHRASE.chars().count())?,
            ),
        };

        let typed = editor.range(start, cursor);
        let query = typed.strip_prefix(TRIGGER_PHRASE)?;

        if editor.line(cursor.line + 1)? != CLOSING_FENCE {
            return None;
        }

        Some(TriggerInfo {
            start,
            end: cursor,
            query: query.to_string(),
        })
    }

    fn suggestions(&self, _context: &TriggerInfo) -> Vec<String> {
        LAYOUT_ENGINES.iter().map(|engine| engine.to_string()).collect()
    }

    fn render_suggestion(&self, suggestion: &str) -> String {
        format!("insert {suggestion} example")
    }

    fn select_suggestion(&self, suggestion: &str, context: &TriggerInfo, editor: &mut dyn Editor) {
        tracing::debug!(engine = suggestion, "Inserting layout skeleton");
        // The skeleton starts on its own line so the fence line stays intact.
        let text = format!("\n{}", layout_skeleton(suggestion));
        editor.insert(&text, context.end);
    }

    fn confirm_chords(&self) -> Vec<KeyChord> {
        vec![KeyChord::with(Modifier::Shift, Key::Enter)]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PopupState {
    Idle,
    Triggered {
        context: TriggerInfo,
        items: Vec<String>,
        selected: usize,
    },
}

/// Drives one suggestion provider: the idle/triggered state machine,
/// highlighted item, and keyboard confirmation.
pub struct SuggestPopup {
    provider: Arc<dyn EditorSuggest>,
    state: PopupState,
}

impl SuggestPopup {
    pub fn new(provider: Arc<dyn EditorSuggest>) -> Self {
        Self {
            provider,
            state: PopupState::Idle,
        }
    }

    pub fn is_triggered(&self) -> bool {
        matches!(self.state, PopupState::Triggered { .. })
    }

    /// Re-evaluate the trigger after an edit or cursor move.
    pub fn update(&mut self, cursor: Position, editor: &dyn Editor) {
        let active = match &self.state {
            PopupState::Triggered { context, .. } => Some(context),
            PopupState::Idle => None,
        };

        self.state = match self.provider.on_trigger(cursor, editor, active) {
            Some(context) => {
                let items = self.provider.suggestions(&context);
                if items.is_empty() {
                    PopupState::Idle
                } else {
                    let selected = match &self.state {
                        PopupState::Triggered { selected, .. } => (*selected).min(items.len() - 1),
                        PopupState::Idle => 0,
                    };
                    PopupState::Triggered {
                        context,
                        items,
                        selected,
                    }
                }
            }
            None => PopupState::Idle,
        };
    }

    /// Display text of each candidate, in order.
    pub fn rendered_items(&self) -> Vec<String> {
        match &self.state {
            PopupState::Triggered { items, .. } => items
                .iter()
                .map(|item| self.provider.render_suggestion(item))
                .collect(),
            PopupState::Idle => Vec::new(),
        }
    }

    /// The highlighted candidate.
    pub fn selected(&self) -> Option<&str> {
        match &self.state {
            PopupState::Triggered {
                items, selected, ..
            } => items.get(*selected).map(String::as_str),
            PopupState::Idle => None,
        }
    }

    /// Handle a key press. Returns `true` if the popup consumed it.
    pub fn on_key(&mut self, chord: KeyChord, editor: &mut dyn Editor) -> bool {
        let PopupState::Triggered {
            items, selected, ..
        } = &mut self.state
        else {
            return false;
        };

        let confirms = chord == KeyChord::new(Key::Enter)
            || self.provider.confirm_chords().contains(&chord);
        if confirms {
            self.confirm(editor);
            return true;
        }

        match chord {
            KeyChord {
                modifier: None,
                key: Key::Down,
            } => {
                *selected = (*selected + 1) % items.len();
                true
            }
            KeyChord {
                modifier: None,
                key: Key::Up,
            } => {
                *selected = selected.checked_sub(1).unwrap_or(items.len() - 1);
                true
            }
            KeyChord {
                modifier: None,
                key: Key::Escape,
            } => {
                self.state = PopupState::Idle;
                true
            }
            _ => false,
        }
    }

    /// Apply the highlighted candidate and close the popup.
    pub fn confirm(&mut self, editor: &mut dyn Editor) -> Option<String> {
        let state = std::mem::replace(&mut self.state, PopupState::Idle);
        let PopupState::Triggered {
            context,
            items,
            selected,
        } = state
        else {
            return None;
        };
        let choice = items.into_iter().nth(selected)?;
        self.provider.select_suggestion(&choice, &context, editor);
        Some(choice)
    }

    /// Choose a candidate by value and close the popup.
    pub fn choose(&mut self, suggestion: &str, editor: &mut dyn Editor) -> bool {
        let position = match &self.state {
            PopupState::Triggered { items, .. } => items.iter().position(|i| i == suggestion),
            PopupState::Idle => None,
        };
        let Some(index) = position else {
            return false;
        };
        if let PopupState::Triggered { selected, .. } = &mut self.state {
            *selected = index;
        }
        self.confirm(editor).is_some()
    }
}

/// An in-memory line buffer implementing [`Editor`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextBuffer {
    lines: Vec<String>,
}

impl TextBuffer {
    pub fn new(text: &str) -> Self {
        Self {
            lines: text.split('\n').map(str::to_string).collect(),
        }
    }

    /// Position just past the last character of `line`.
    pub fn end_of_line(&self, line: usize) -> Option<Position> {
        self.lines
            .get(line)
            .map(|text| Position::new(line, text.chars().count()))
    }

    fn byte_index(text: &str, ch: usize) -> usize {
        text.char_indices()
            .nth(ch)
            .map(|(index, _)| index)
            .unwrap_or(text.len())
    }
}

impl fmt::Display for TextBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lines.join("\n"))
    }
}

impl Editor for TextBuffer {
    fn line(&self, line: usize) -> Option<&str> {
        self.lines.get(line).map(String::as_str)
    }

    fn range(&self, from: Position, to: Position) -> String {
        if to <= from || from.line >= self.lines.len() {
            return String::new();
        }
        let last = to.line.min(self.lines.len() - 1);
        let mut out = String::new();
        for index in from.line..=last {
            let text = &self.lines[index];
            let begin = if index == from.line {
                Self::byte_index(text, from.ch)
            } else {
                0
            };
            let end = if index == to.line {
                Self::byte_index(text, to.ch)
            } else {
                text.len()
            };
            out.push_str(&text[begin..end.max(begin)]);
            if index != last {
                out.push('\n');
            }
        }
        out
    }

    fn insert(&mut self, text: &str, at: Position) {
        if at.line >= self.lines.len() {
            self.lines.resize(at.line + 1, String::new());
        }
        let current = &self.lines[at.line];
        let split = Self::byte_index(current, at.ch);
        let joined = format!("{}{}{}", &current[..split], text, &current[split..]);
        let replacement: Vec<String> = joined.split('\n').map(str::to_string).collect();
        self.lines.splice(at.line..=at.line, replacement);
    }

    fn line_count(&self) -> usize {
        self.lines.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triggered_buffer() -> (TextBuffer, Position) {
        let buffer = TextBuffer::new("# Notes\n```dot\n```\n");
        let cursor = buffer.end_of_line(1).unwrap();
        (buffer, cursor)
    }

    #[test]
    fn test_skeleton_for_dot() {
        assert_eq!(
            layout_skeleton("dot"),
            "digraph d {\n    layout=dot;\n    /*\n    a -> b -> a;\n    a [color=blue];\n    */\n\n}"
        );
    }

    #[test]
    fn test_skeleton_for_neato() {
        assert_eq!(
            layout_skeleton("neato"),
            "graph n {\n    layout=neato;\n    mode=\"major\";  // KK/sgd/hier/ipsep\n    /* a -- b -- c; */\n\n}"
        );
    }

    #[test]
    fn test_skeleton_without_hints() {
        assert_eq!(layout_skeleton("circo"), "graph c {\n    layout=circo;\n\n\n}");
    }

    #[test]
    fn test_trigger_on_empty_block() {
        let (buffer, cursor) = triggered_buffer();
        let info = LayoutSuggest.on_trigger(cursor, &buffer, None).unwrap();
        assert_eq!(info.start, Position::new(1, 0));
        assert_eq!(info.end, cursor);
        assert_eq!(info.query, "");
    }

    #[test]
    fn test_no_trigger_without_closing_fence() {
        let buffer = TextBuffer::new("```dot\ndigraph {}\n```");
        let cursor = buffer.end_of_line(0).unwrap();
        assert!(LayoutSuggest.on_trigger(cursor, &buffer, None).is_none());

        let buffer = TextBuffer::new("```dot");
        let cursor = buffer.end_of_line(0).unwrap();
        assert!(LayoutSuggest.on_trigger(cursor, &buffer, None).is_none());
    }

    #[test]
    fn test_no_trigger_for_other_phrase() {
        let buffer = TextBuffer::new("```dop\n```");
        let cursor = buffer.end_of_line(0).unwrap();
        assert!(LayoutSuggest.on_trigger(cursor, &buffer, None).is_none());

        let buffer = TextBuffer::new("``\n```");
        assert!(
            LayoutSuggest
                .on_trigger(Position::new(0, 2), &buffer, None)
                .is_none()
        );
    }

    #[test]
    fn test_trigger_keeps_start_while_typing() {
        let buffer = TextBuffer::new("```dotneato\n```");
        let first = LayoutSuggest
            .on_trigger(Position::new(0, 6), &buffer, None)
            .unwrap();
        let next = LayoutSuggest
            .on_trigger(Position::new(0, 11), &buffer, Some(&first))
            .unwrap();
        assert_eq!(next.start, Position::new(0, 0));
        assert_eq!(next.query, "neato");
    }

    #[test]
    fn test_suggestions_are_rendered_in_order() {
        let (buffer, cursor) = triggered_buffer();
        let mut popup = SuggestPopup::new(Arc::new(LayoutSuggest));
        popup.update(cursor, &buffer);
        assert!(popup.is_triggered());
        assert_eq!(
            popup.rendered_items(),
            LAYOUT_ENGINES
                .iter()
                .map(|e| format!("insert {e} example"))
                .collect::<Vec<_>>()
        );
        assert_eq!(popup.selected(), Some("dot"));
    }

    #[test]
    fn test_select_neato_inserts_graph() {
        let (mut buffer, cursor) = triggered_buffer();
        let mut popup = SuggestPopup::new(Arc::new(LayoutSuggest));
        popup.update(cursor, &buffer);
        assert!(popup.choose("neato", &mut buffer));
        assert!(!popup.is_triggered());

        assert_eq!(
            buffer.to_string(),
            "# Notes\n```dot\ngraph n {\n    layout=neato;\n    mode=\"major\";  // KK/sgd/hier/ipsep\n    /* a -- b -- c; */\n\n}\n```\n"
        );
    }

    #[test]
    fn test_shift_enter_confirms() {
        let (mut buffer, cursor) = triggered_buffer();
        let mut popup = SuggestPopup::new(Arc::new(LayoutSuggest));
        popup.update(cursor, &buffer);

        assert!(popup.on_key(KeyChord::new(Key::Down), &mut buffer));
        assert_eq!(popup.selected(), Some("neato"));
        assert!(popup.on_key(KeyChord::with(Modifier::Shift, Key::Enter), &mut buffer));
        assert!(!popup.is_triggered());
        assert!(buffer.to_string().contains("layout=neato;"));
    }

    #[test]
    fn test_enter_confirms_and_up_wraps() {
        let (mut buffer, cursor) = triggered_buffer();
        let mut popup = SuggestPopup::new(Arc::new(LayoutSuggest));
        popup.update(cursor, &buffer);

        popup.on_key(KeyChord::new(Key::Up), &mut buffer);
        assert_eq!(popup.selected(), Some("patchwork"));
        assert!(popup.on_key(KeyChord::new(Key::Enter), &mut buffer));
        assert!(buffer.to_string().contains("graph p {\n    layout=patchwork;"));
    }

    #[test]
    fn test_unrelated_chord_is_ignored() {
        let (mut buffer, cursor) = triggered_buffer();
        let mut popup = SuggestPopup::new(Arc::new(LayoutSuggest));
        popup.update(cursor, &buffer);
        assert!(!popup.on_key(KeyChord::with(Modifier::Ctrl, Key::Enter), &mut buffer));
        assert!(popup.is_triggered());
    }

    #[test]
    fn test_moving_off_line_returns_to_idle() {
        let (buffer, cursor) = triggered_buffer();
        let mut popup = SuggestPopup::new(Arc::new(LayoutSuggest));
        popup.update(cursor, &buffer);
        assert!(popup.is_triggered());

        popup.update(Position::new(0, 3), &buffer);
        assert!(!popup.is_triggered());
        assert!(popup.rendered_items().is_empty());
    }

    #[test]
    fn test_escape_dismisses() {
        let (mut buffer, cursor) = triggered_buffer();
        let mut popup = SuggestPopup::new(Arc::new(LayoutSuggest));
        popup.update(cursor, &buffer);
        assert!(popup.on_key(KeyChord::new(Key::Escape), &mut buffer));
        assert!(!popup.is_triggered());
        assert_eq!(buffer.to_string(), "# Notes\n```dot\n```\n");
    }

    #[test]
    fn test_buffer_range_and_insert() {
        let mut buffer = TextBuffer::new("héllo\nworld");
        assert_eq!(buffer.range(Position::new(0, 1), Position::new(0, 4)), "éll");
        assert_eq!(buffer.range(Position::new(0, 3), Position::new(1, 2)), "lo\nwo");
        assert_eq!(buffer.range(Position::new(1, 2), Position::new(0, 0)), "");

        buffer.insert("X\nY", Position::new(0, 2));
        assert_eq!(buffer.to_string(), "héX\nYllo\nworld");
        assert_eq!(buffer.line_count(), 3);
    }
}
