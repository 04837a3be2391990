//! Prompt input and suggestion state.

/// Prompt template behind the quick "validate" action
pub const VALIDATE_TEMPLATE: &str = "Провалидировать форму http://localhost:3000/form/{Ваш id}";

/// Label of the quick "validate" action
pub const VALIDATE_LABEL: &str = "Провалидировать";

/// A labelled set of canned prompts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionGroup {
    pub label: &'static str,
    /// Prefix emphasised when rendering items
    pub highlight: &'static str,
    pub items: &'static [&'static str],
}

pub const SUGGESTION_GROUPS: &[SuggestionGroup] = &[SuggestionGroup {
    label: "Популярные вопросы",
    highlight: "Как",
    items: &[
        "Как провалидировать форму?",
        "Как помочь с кодом?",
        "Как помочь с дизайном?",
        "Как помочь с исследованием?",
    ],
}];

/// Which suggestion list is open
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SuggestionSelection {
    #[default]
    None,
    Category(String),
}

/// What the suggestion row shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibleSuggestions {
    /// The prompt has text
    Hidden,
    /// Category labels
    Categories(Vec<&'static str>),
    /// Items of the selected category
    Items {
        highlight: &'static str,
        items: Vec<&'static str>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Composer {
    text: String,
    selection: SuggestionSelection,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn selection(&self) -> &SuggestionSelection {
        &self.selection
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn push(&mut self, c: char) {
        self.text.push(c);
    }

    pub fn pop(&mut self) {
        self.text.pop();
    }

    /// Open a category; clears the prompt. Unknown labels are ignored.
    pub fn select_category(&mut self, label: &str) {
        if SUGGESTION_GROUPS.iter().any(|g| g.label == label) {
            self.selection = SuggestionSelection::Category(label.to_string());
            self.text.clear();
        }
    }

    /// Put a suggestion into the prompt
    pub fn choose(&mut self, suggestion: &str) {
        self.text = suggestion.to_string();
    }

    /// Fill the prompt with the validation template
    pub fn quick_validate(&mut self) {
        self.choose(VALIDATE_TEMPLATE);
    }

    /// Take the trimmed prompt for submission, clearing the input either way
    pub fn take_prompt(&mut self) -> Option<String> {
        let text = std::mem::take(&mut self.text);
        let prompt = text.trim();
        if prompt.is_empty() {
            return None;
        }
        self.selection = SuggestionSelection::None;
        Some(prompt.to_string())
    }

    pub fn visible_suggestions(&self) -> VisibleSuggestions {
        if !self.is_blank() {
            return VisibleSuggestions::Hidden;
        }

        let group = match &self.selection {
            SuggestionSelection::Category(label) => {
                SUGGESTION_GROUPS.iter().find(|g| g.label == label.as_str())
            }
            SuggestionSelection::None => None,
        };

        match group {
            Some(group) => VisibleSuggestions::Items {
                highlight: group.highlight,
                items: group.items.to_vec(),
            },
            None => VisibleSuggestions::Categories(
                SUGGESTION_GROUPS.iter().map(|g| g.label).collect(),
            ),
        }
    }

    /// Activate the `index`-th visible suggestion
    pub fn pick(&mut self, index: usize) {
        match self.visible_suggestions() {
            VisibleSuggestions::Categories(labels) => {
                if let Some(label) = labels.get(index) {
                    self.select_category(label);
                }
            }
            VisibleSuggestions::Items { items, .. } => {
                if let Some(item) = items.get(index) {
                    self.choose(item);
                }
            }
            VisibleSuggestions::Hidden => {}
        }
    }
}
