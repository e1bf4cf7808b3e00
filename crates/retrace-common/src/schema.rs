//! Recorded document schema.
//!
//! A recorded document is the durable artifact between a recording session and any
//! number of later replays, so it has to round-trip without losing meaning. Each step
//! carries its action as an object keyed by the action name:
//!
//! ```json
//! {
//!   "index": 1,
//!   "action": { "click_element": { "index": 12 } },
//!   "element": { "tag_name": "button", "attributes": { "id": "submit" } }
//! }
//! ```

use crate::error::DocumentError;
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Current version of the recorded document schema.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayDocument {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_case: Option<String>,
    /// Values substituted for `<secret>KEY</secret>` placeholders in typed text.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub secrets: BTreeMap<String, String>,
    pub steps: Vec<RecordedStep>,
}

impl ReplayDocument {
    pub fn new(steps: Vec<RecordedStep>) -> Self {
        Self {
            version: SCHEMA_VERSION,
            test_case: None,
            secrets: BTreeMap::new(),
            steps,
        }
    }

    /// Parse and validate a document from its JSON text.
    pub fn from_json(content: &str) -> Result<Self, DocumentError> {
        let doc: ReplayDocument = serde_json::from_str(content)?;
        doc.validate()?;
        Ok(doc)
    }

    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse without the structural step checks, for callers that validate later
    /// with their own skippable indexes (see [`validate_steps_skipping`]).
    pub fn load_unchecked(path: &Path) -> Result<Self, DocumentError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), DocumentError> {
        std::fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), DocumentError> {
        self.check_version()?;
        validate_steps(&self.steps)
    }

    pub fn check_version(&self) -> Result<(), DocumentError> {
        if self.version != SCHEMA_VERSION {
            return Err(DocumentError::UnsupportedVersion {
                found: self.version,
                supported: SCHEMA_VERSION,
            });
        }
        Ok(())
    }
}

/// Structural checks every step sequence must pass before a replay may start.
pub fn validate_steps(steps: &[RecordedStep]) -> Result<(), DocumentError> {
    validate_steps_skipping(steps, &BTreeSet::new())
}

/// Like [`validate_steps`], with extra step indexes treated as skippable.
///
/// Skippable steps never reach the driver, so only their position is checked. A
/// Navigate URL must be absolute (scheme included), as browsers require for `goto`.
pub fn validate_steps_skipping(
    steps: &[RecordedStep],
    skippable: &BTreeSet<usize>,
) -> Result<(), DocumentError> {
    for (position, step) in steps.iter().enumerate() {
        if step.index != position {
            return Err(DocumentError::IndexMismatch {
                position,
                index: step.index,
            });
        }
        if step.skippable || skippable.contains(&step.index) {
            continue;
        }

        if step.action.requires_element() && step.element.is_none() {
            return Err(DocumentError::MissingElement {
                index: step.index,
                action: step.action.name(),
            });
        }
        if let StepAction::Navigate(params) = &step.action
            && let Err(e) = url::Url::parse(&params.url)
        {
            return Err(DocumentError::InvalidUrl {
                index: step.index,
                url: params.url.clone(),
                reason: e.to_string(),
            });
        }
    }
    Ok(())
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedStep {
    pub index: usize,
    pub action: StepAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<ElementDescriptor>,
    /// Marked ahead of replay as not essential to the workflow.
    #[serde(default, skip_serializing_if = "is_false")]
    pub skippable: bool,
}

impl RecordedStep {
    pub fn new(index: usize, action: StepAction) -> Self {
        Self {
            index,
            action,
            element: None,
            skippable: false,
        }
    }

    pub fn with_element(mut self, element: ElementDescriptor) -> Self {
        self.element = Some(element);
        self
    }

    pub fn skippable(mut self) -> Self {
        self.skippable = true;
        self
    }
}

/// The action recorded for a step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepAction {
    Navigate(NavigateParams),
    Click(ClickParams),
    InputText(InputTextParams),
    SelectOption(SelectOptionParams),
    Wait(WaitParams),
    ScrollDown(ScrollParams),
    ScrollUp(ScrollParams),
    Done(DoneParams),
    /// A recorded action kind that replay does not implement.
    Unsupported(UnsupportedAction),
}

impl StepAction {
    /// Canonical discriminator written when serializing.
    pub fn name(&self) -> &'static str {
        match self {
            StepAction::Navigate(_) => "navigate",
            StepAction::Click(_) => "click_element",
            StepAction::InputText(_) => "input_text",
            StepAction::SelectOption(_) => "select_dropdown_option",
            StepAction::Wait(_) => "wait",
            StepAction::ScrollDown(p) if p.quarter_page => "quarter_page_scroll_down",
            StepAction::ScrollDown(_) => "scroll_down",
            StepAction::ScrollUp(p) if p.quarter_page => "quarter_page_scroll_up",
            StepAction::ScrollUp(_) => "scroll_up",
            StepAction::Done(_) => "done",
            StepAction::Unsupported(u) => u.kind.key(),
        }
    }

    /// Actions that target an element and therefore need a recorded descriptor.
    pub fn requires_element(&self) -> bool {
        matches!(
            self,
            StepAction::Click(_) | StepAction::InputText(_) | StepAction::SelectOption(_)
        )
    }

    /// Build an action from its discriminator and raw parameters.
    pub fn from_parts(key: &str, params: Value) -> Result<Self, String> {
        fn params_of<T: serde::de::DeserializeOwned>(
            key: &str,
            params: Value,
        ) -> Result<T, String> {
            serde_json::from_value(params)
                .map_err(|e| format!("invalid `{}` parameters: {}", key, e))
        }

        let quarter = |key: &str, params: Value| -> Result<ScrollParams, String> {
            Ok(ScrollParams {
                quarter_page: true,
                ..params_of(key, params)?
            })
        };

        let action = match key {
            "navigate" | "go_to_url" => StepAction::Navigate(params_of(key, params)?),
            "click_element" | "click_element_by_index" => {
                StepAction::Click(params_of(key, params)?)
            }
            "input_text" => StepAction::InputText(params_of(key, params)?),
            "select_dropdown_option" => StepAction::SelectOption(params_of(key, params)?),
            "wait" => StepAction::Wait(params_of(key, params)?),
            "scroll_down" => StepAction::ScrollDown(params_of(key, params)?),
            "scroll_up" => StepAction::ScrollUp(params_of(key, params)?),
            // A full page is the viewport height, which is what a missing amount means.
            "full_page_scroll_down" => StepAction::ScrollDown(ScrollParams::default()),
            "full_page_scroll_up" => StepAction::ScrollUp(ScrollParams::default()),
            "quarter_page_scroll_down" => StepAction::ScrollDown(quarter(key, params)?),
            "quarter_page_scroll_up" => StepAction::ScrollUp(quarter(key, params)?),
            "done" => StepAction::Done(params_of(key, params)?),
            other => match UnsupportedKind::from_key(other) {
                Some(kind) => StepAction::Unsupported(UnsupportedAction { kind, params }),
                None => return Err(format!("unknown action `{}`", other)),
            },
        };
        Ok(action)
    }
}

impl Serialize for StepAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            StepAction::Navigate(p) => map.serialize_entry(self.name(), p)?,
            StepAction::Click(p) => map.serialize_entry(self.name(), p)?,
            StepAction::InputText(p) => map.serialize_entry(self.name(), p)?,
            StepAction::SelectOption(p) => map.serialize_entry(self.name(), p)?,
            StepAction::Wait(p) => map.serialize_entry(self.name(), p)?,
            StepAction::ScrollDown(p) | StepAction::ScrollUp(p) => {
                map.serialize_entry(self.name(), p)?
            }
            StepAction::Done(p) => map.serialize_entry(self.name(), p)?,
            StepAction::Unsupported(u) => map.serialize_entry(self.name(), &u.params)?,
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for StepAction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Recorders emit every action slot and leave the unused ones null.
        let raw = serde_json::Map::<String, Value>::deserialize(deserializer)?;
        let mut populated = raw.into_iter().filter(|(_, v)| !v.is_null());

        let (key, params) = populated
            .next()
            .ok_or_else(|| D::Error::custom("action object has no populated key"))?;
        if let Some((extra, _)) = populated.next() {
            return Err(D::Error::custom(format!(
                "action object has more than one populated key (`{}`, `{}`)",
                key, extra
            )));
        }

        StepAction::from_parts(&key, params).map_err(D::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigateParams {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClickParams {
    /// Element index assigned by the recorder; informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputTextParams {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOptionParams {
    /// Visible label of the option to choose.
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitParams {
    #[serde(default = "default_wait_seconds")]
    pub seconds: u64,
}

fn default_wait_seconds() -> u64 {
    3
}

impl Default for WaitParams {
    fn default() -> Self {
        Self {
            seconds: default_wait_seconds(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScrollParams {
    /// Pixels to scroll; `None` scrolls by one viewport height.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    /// Scroll a quarter of the viewport height. Encoded in the action key.
    #[serde(skip)]
    pub quarter_page: bool,
}

impl ScrollParams {
    pub fn by(amount: i64) -> Self {
        Self {
            amount: Some(amount),
            quarter_page: false,
        }
    }

    pub fn quarter_page() -> Self {
        Self {
            amount: None,
            quarter_page: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DoneParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnsupportedAction {
    pub kind: UnsupportedKind,
    /// Parameters kept verbatim so the document still round-trips.
    pub params: Value,
}

/// Recorded action kinds that exist in recordings but have no replay implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnsupportedKind {
    ExtractContent,
    GoBack,
    SearchGoogle,
    SavePdf,
    SwitchTab,
    OpenTab,
    CloseTab,
    GetAxTree,
    SendKeys,
    ScrollToText,
    GetDropdownOptions,
    DragDrop,
    UploadFile,
    ThirdPartyAuthenticationWait,
    CloseOverlay,
    HoverDirect,
}

impl UnsupportedKind {
    const ALL: [UnsupportedKind; 16] = [
        UnsupportedKind::ExtractContent,
        UnsupportedKind::GoBack,
        UnsupportedKind::SearchGoogle,
        UnsupportedKind::SavePdf,
        UnsupportedKind::SwitchTab,
        UnsupportedKind::OpenTab,
        UnsupportedKind::CloseTab,
        UnsupportedKind::GetAxTree,
        UnsupportedKind::SendKeys,
        UnsupportedKind::ScrollToText,
        UnsupportedKind::GetDropdownOptions,
        UnsupportedKind::DragDrop,
        UnsupportedKind::UploadFile,
        UnsupportedKind::ThirdPartyAuthenticationWait,
        UnsupportedKind::CloseOverlay,
        UnsupportedKind::HoverDirect,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            UnsupportedKind::ExtractContent => "extract_content",
            UnsupportedKind::GoBack => "go_back",
            UnsupportedKind::SearchGoogle => "search_google",
            UnsupportedKind::SavePdf => "save_pdf",
            UnsupportedKind::SwitchTab => "switch_tab",
            UnsupportedKind::OpenTab => "open_tab",
            UnsupportedKind::CloseTab => "close_tab",
            UnsupportedKind::GetAxTree => "get_ax_tree",
            UnsupportedKind::SendKeys => "send_keys",
            UnsupportedKind::ScrollToText => "scroll_to_text",
            UnsupportedKind::GetDropdownOptions => "get_dropdown_options",
            UnsupportedKind::DragDrop => "drag_drop",
            UnsupportedKind::UploadFile => "upload_file",
            UnsupportedKind::ThirdPartyAuthenticationWait => "third_party_authentication_wait",
            UnsupportedKind::CloseOverlay => "close_overlay",
            UnsupportedKind::HoverDirect => "hover_direct",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }
}

/// Filters out null attribute values, which recorders emit for absent attributes.
fn deserialize_nullable_string_map<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let map: BTreeMap<String, Option<String>> = BTreeMap::deserialize(deserializer)?;
    Ok(map
        .into_iter()
        .filter_map(|(k, v)| v.map(|val| (k, val)))
        .collect())
}

/// Identity of a DOM element as captured at recording time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ElementDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_nullable_string_map",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub attributes: BTreeMap<String, String>,
    /// Absolute XPath of the element in the recorded page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xpath: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css_selector: Option<String>,
    /// Relative XPaths computed by the recorder against the recorded page.
    #[serde(
        default,
        alias = "alternative_relative_xpaths",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub alternative_xpaths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ElementDescriptor {
    pub fn with_xpath(xpath: impl Into<String>) -> Self {
        Self {
            xpath: Some(xpath.into()),
            ..Default::default()
        }
    }

    pub fn with_tag(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: Some(tag_name.into()),
            ..Default::default()
        }
    }

    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Whether the descriptor carries enough to attempt resolution at all.
    pub fn has_identity(&self) -> bool {
        let non_empty = |s: &Option<String>| s.as_deref().is_some_and(|v| !v.trim().is_empty());
        non_empty(&self.xpath)
            || non_empty(&self.css_selector)
            || !self.alternative_xpaths.is_empty()
            || (non_empty(&self.tag_name)
                && (!self.attributes.is_empty() || non_empty(&self.text)))
    }
}
