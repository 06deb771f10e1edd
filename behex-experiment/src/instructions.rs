use std::collections::HashMap;
use std::path::{Path, PathBuf};

use behex_core::{Key, ResponseMapping, Result, Surface};
use behex_io::ResponseDevice;

use crate::experiment::Experiment;

/// What a navigation key does on an instructions page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavAction {
    Prev,
    Next,
    Finish,
}

/// Key-to-action map for paging through instructions.
#[derive(Clone, Debug)]
pub struct Navigation {
    pairs: Vec<(Key, NavAction)>,
}

impl Navigation {
    pub fn new(pairs: Vec<(Key, NavAction)>) -> Self {
        Navigation { pairs }
    }

    /// Arrow keys page back and forth, space advances.
    pub fn default_keyboard() -> Self {
        Navigation::new(vec![
            (Key::code("left"), NavAction::Prev),
            (Key::code("right"), NavAction::Next),
            (Key::code("space"), NavAction::Next),
        ])
    }

    /// Navigate with the keys the subject already knows: the response
    /// keys labeled `left` and `right`. Falls back to the keyboard
    /// defaults when the mapping has no such labels.
    pub fn from_mapping(mapping: &ResponseMapping) -> Self {
        let mut pairs = Vec::new();
        if let Some(key) = mapping.key_for("left") {
            pairs.push((key.clone(), NavAction::Prev));
        }
        if let Some(key) = mapping.key_for("right") {
            pairs.push((key.clone(), NavAction::Next));
        }
        if pairs.is_empty() {
            return Navigation::default_keyboard();
        }
        Navigation::new(pairs)
    }

    /// Require a dedicated key to leave the last page.
    pub fn with_finish_key(mut self, key: Key) -> Self {
        self.pairs.push((key, NavAction::Finish));
        self
    }

    pub fn has_finish_key(&self) -> bool {
        self.pairs
            .iter()
            .any(|(_, action)| *action == NavAction::Finish)
    }

    /// Keys accepted on a page. On the last page of a finish-gated set,
    /// the finish key replaces the plain forward keys.
    fn keys_for(&self, allow_finish: bool) -> Vec<Key> {
        self.pairs
            .iter()
            .filter(|(_, action)| match action {
                NavAction::Next => !allow_finish,
                NavAction::Finish => allow_finish,
                NavAction::Prev => true,
            })
            .map(|(key, _)| key.clone())
            .collect()
    }

    fn action(&self, key: &Key) -> Option<NavAction> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, action)| *action)
    }

    /// Placeholder substitutions for text pages: `{prev}` and `{next}`
    /// resolve to the key names assigned to those actions.
    pub fn substitutions(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        for (key, action) in &self.pairs {
            let name = match action {
                NavAction::Prev => "prev",
                NavAction::Next => "next",
                NavAction::Finish => "finish",
            };
            map.entry(name.to_string()).or_insert_with(|| key.to_string());
        }
        map
    }
}

/// One instructions page: an image file, prepared text, or a callback
/// that presents itself (e.g. a live demo of the task).
pub enum Page<S: Surface> {
    Image(PathBuf),
    Text(String),
    Callback(Box<dyn FnMut(&mut Experiment<S>) -> Result<()>>),
}

/// Sequential instructions presenter with subject-paced navigation.
///
/// Image and text pages are turned into stimuli on first presentation and
/// cached; callback pages run their closure and auto-advance.
pub struct Instructions<S: Surface> {
    pages: Vec<Page<S>>,
    prepared: Vec<Option<S::Stim>>,
    navigation: Navigation,
    next_page: usize,
}

impl<S: Surface> Instructions<S> {
    pub fn new(pages: Vec<Page<S>>, navigation: Navigation) -> Self {
        Instructions {
            pages,
            prepared: Vec::new(),
            navigation,
            next_page: 0,
        }
    }

    pub fn from_images(paths: Vec<PathBuf>, navigation: Navigation) -> Self {
        let pages = paths.into_iter().map(Page::Image).collect();
        Instructions::new(pages, navigation)
    }

    /// Read pages from a text file with `[page]` separator lines,
    /// substituting `{placeholder}` markers from the navigation map.
    pub fn from_text_file(
        path: &Path,
        navigation: Navigation,
    ) -> Result<Self> {
        let texts = read_txt_instructions(path, &navigation.substitutions())?;
        let pages = texts.into_iter().map(Page::Text).collect();
        Ok(Instructions::new(pages, navigation))
    }

    pub fn n_pages(&self) -> usize {
        self.pages.len()
    }

    fn generate(&mut self, exp: &mut Experiment<S>) -> Result<()> {
        self.prepared.clear();
        for page in &self.pages {
            let stim = match page {
                Page::Image(path) => Some(exp.surface.load_image(path)?),
                Page::Text(text) => Some(exp.surface.make_text(text)?),
                Page::Callback(_) => None,
            };
            self.prepared.push(stim);
        }
        Ok(())
    }

    /// Present pages `start..stop` (defaults: where the last call left
    /// off, through the end), paging under subject control.
    pub fn present(
        &mut self,
        exp: &mut Experiment<S>,
        start: Option<usize>,
        stop: Option<usize>,
    ) -> Result<()> {
        if self.prepared.len() != self.pages.len() {
            self.generate(exp)?;
        }
        let stop = stop.unwrap_or(self.pages.len()).min(self.pages.len());
        if let Some(start) = start {
            self.next_page = start;
        }

        while self.next_page < stop {
            let allow_finish = self.navigation.has_finish_key()
                && self.next_page + 1 == stop;
            match self.show_page(exp, allow_finish)? {
                NavAction::Next | NavAction::Finish => self.next_page += 1,
                NavAction::Prev => {
                    self.next_page = self.next_page.saturating_sub(1);
                }
            }
        }
        Ok(())
    }

    fn show_page(
        &mut self,
        exp: &mut Experiment<S>,
        allow_finish: bool,
    ) -> Result<NavAction> {
        if let Page::Callback(callback) = &mut self.pages[self.next_page] {
            callback(exp)?;
            return Ok(NavAction::Next);
        }

        if let Some(stim) = &self.prepared[self.next_page] {
            exp.surface.draw(stim)?;
        }
        exp.surface.flip()?;

        let allowed = self.navigation.keys_for(allow_finish);
        exp.input.clear_buffer();
        let press = exp
            .input
            .wait_key_checked(Some(&allowed), exp.mapping.quit_key())?;
        Ok(self
            .navigation
            .action(&press.key)
            .expect("the press was filtered by the allowed list"))
    }
}

/// Split a text file into instruction pages at `[page]` marker lines
/// (numbering such as `[page02]` is fine) and apply `{placeholder}`
/// substitutions. Lines before the first marker are dropped.
pub fn read_txt_instructions(
    path: &Path,
    substitute: &HashMap<String, String>,
) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)?;
    let mut pages: Vec<String> = Vec::new();
    for line in text.lines() {
        if line.trim_start().starts_with("[page") {
            pages.push(String::new());
        } else if let Some(page) = pages.last_mut() {
            page.push_str(line);
            page.push('\n');
        }
    }
    for page in &mut pages {
        for (name, value) in substitute {
            *page = page.replace(&format!("{{{name}}}"), value);
        }
    }
    Ok(pages)
}
