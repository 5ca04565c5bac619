//! Local repairs applied to model-generated Manim scripts.
//!
//! The model output is untrusted text. These functions strip markdown,
//! rewrite idioms known to crash Manim, and make sure the script has the
//! minimal structure the renderer needs.

use std::sync::LazyLock;

use regex::{Captures, Regex};

pub const MANIM_IMPORT: &str = "from manim import *";
pub const NUMPY_IMPORT: &str = "import numpy as np";

const VOICEOVER_IMPORTS: &str = "from manim_voiceover import VoiceoverScene\nfrom manim_voiceover.services.azure import AzureService";

const SPEECH_SERVICE_INIT: &str = r#"        # Initialize speech service
        self.set_speech_service(
            AzureService(
                voice="en-US-JennyNeural",
                style="friendly"
            )
        )

"#;

/// Colour names models like to use that Manim does not define.
const COLOR_REPLACEMENTS: [(&str, &str); 8] = [
    ("BROWN", "\"#8B4513\""),
    ("CYAN", "TEAL"),
    ("LIME", "GREEN"),
    ("NAVY", "BLUE"),
    ("SILVER", "LIGHT_GRAY"),
    ("OLIVE", "YELLOW"),
    ("AQUA", "TEAL"),
    ("FUCHSIA", "PINK"),
];

static FENCE_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```python\s*\n").expect("valid regex"));
static FENCE_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)```\s*$").expect("valid regex"));

static ALL_MOBJECTS_GROUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"VGroup\(\*self\.mobjects\)").expect("valid regex"));
static MOBJECTS_IN_GROUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"VGroup\([^)]*self\.mobjects[^)]*\)").expect("valid regex"));

/// `self.play(Create(some_group))` and friends, one regex per animation.
static GROUP_ANIMATION_RES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    ["Create", "Write", "FadeIn"]
        .into_iter()
        .map(|anim| {
            let pattern = format!(
                r"self\.play\({anim}\(([a-zA-Z_][a-zA-Z0-9_]*(?:_group|_objects|Group|VGroup)[^)]*)\)\)"
            );
            (anim, Regex::new(&pattern).expect("valid regex"))
        })
        .collect()
});

static NORMALIZE_CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([a-zA-Z_][a-zA-Z0-9_]*(?:\s*[-+]\s*[a-zA-Z_][a-zA-Z0-9_]*)?)\.normalize\(\)")
        .expect("valid regex")
});
static NORMAL_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([a-zA-Z_][a-zA-Z0-9_]*(?:\s*[-+]\s*[a-zA-Z_][a-zA-Z0-9_]*)?)\.normal\b")
        .expect("valid regex")
});

static COLOR_RES: LazyLock<Vec<(Regex, String)>> = LazyLock::new(|| {
    COLOR_REPLACEMENTS
        .iter()
        .map(|(bad, good)| {
            (
                Regex::new(&format!(r"color={bad}\b")).expect("valid regex"),
                format!("color={good}"),
            )
        })
        .collect()
});

static MANIM_IMPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"from manim import \*").expect("valid regex"));
static SCENE_CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"class \w+\(Scene\):").expect("valid regex"));
static CONSTRUCT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"def construct\(self\):").expect("valid regex"));
static CONSTRUCT_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(def construct\(self\):\s*\n)").expect("valid regex"));
static PLAIN_SCENE_CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"class\s+(\w+)\s*\(\s*Scene\s*\):").expect("valid regex"));

/// Remove markdown code fences around a script.
pub fn strip_fences(text: &str) -> String {
    let text = FENCE_OPEN_RE.replace_all(text, "");
    let text = FENCE_CLOSE_RE.replace_all(&text, "");
    text.trim().to_string()
}

/// Rewrite idioms that reliably crash Manim.
pub fn fix_common_issues(script: &str) -> String {
    let mut script = ALL_MOBJECTS_GROUP_RE
        .replace_all(
            script,
            r#"Group(*[mob for mob in self.mobjects if hasattr(mob, "animate")])"#,
        )
        .into_owned();
    script = MOBJECTS_IN_GROUP_RE.replace_all(&script, "Group()").into_owned();

    for (anim, re) in GROUP_ANIMATION_RES.iter() {
        script = re
            .replace_all(&script, |caps: &Captures| {
                format!("self.play(*[{anim}(obj) for obj in {}])", &caps[1])
            })
            .into_owned();
    }

    script = NORMALIZE_CALL_RE.replace_all(&script, normalised).into_owned();
    script = NORMAL_ATTR_RE.replace_all(&script, normalised).into_owned();

    if script.contains("np.linalg.norm") && !script.contains(NUMPY_IMPORT) {
        script = format!("{NUMPY_IMPORT}\n{script}");
    }

    for (re, replacement) in COLOR_RES.iter() {
        script = re
            .replace_all(&script, regex::NoExpand(replacement.as_str()))
            .into_owned();
    }
    script
}

/// `v.normalize()` and `v.normal` become an explicit numpy division.
fn normalised(caps: &Captures) -> String {
    format!("({0} / np.linalg.norm({0}))", &caps[1])
}

/// Whether the script imports Manim and defines a Scene with `construct`.
pub fn has_valid_structure(script: &str) -> bool {
    [&*MANIM_IMPORT_RE, &*SCENE_CLASS_RE, &*CONSTRUCT_RE]
        .into_iter()
        .all(|re| {
            let found = re.is_match(script);
            if !found {
                tracing::warn!(pattern = re.as_str(), "Script is missing required pattern");
            }
            found
        })
}

/// Add missing imports and, when there is no Scene class at all, wrap the
/// whole text in one.
pub fn apply_structure_fixes(script: &str) -> String {
    let mut script = script.to_string();
    if !MANIM_IMPORT_RE.is_match(&script) {
        script = format!("{MANIM_IMPORT}\n\n{script}");
    }
    if script.contains("np.") && !script.contains(NUMPY_IMPORT) {
        script = script.replacen(MANIM_IMPORT, &format!("{MANIM_IMPORT}\n{NUMPY_IMPORT}"), 1);
    }
    if !SCENE_CLASS_RE.is_match(&script) {
        let body: Vec<String> = script
            .lines()
            .filter(|line| !matches!(line.trim(), MANIM_IMPORT | NUMPY_IMPORT))
            .map(|line| format!("        {line}"))
            .collect();
        script = format!(
            "{MANIM_IMPORT}\n{NUMPY_IMPORT}\n\nclass GeneratedScene(Scene):\n    def construct(self):\n        # Generated content\n{}\n\n        self.wait(2)\n",
            body.join("\n")
        );
    }
    script
}

/// Full local clean-up of a freshly generated script.
pub fn clean_script(raw: &str) -> String {
    let script = fix_common_issues(&strip_fences(raw));
    if has_valid_structure(&script) {
        script
    } else {
        tracing::warn!("Script structure validation failed, applying structure fixes");
        apply_structure_fixes(&script)
    }
}

/// Make sure the voiceover imports are present.
pub fn add_voiceover_imports(script: &str) -> String {
    if script.contains(MANIM_IMPORT) {
        script.replacen(MANIM_IMPORT, &format!("{MANIM_IMPORT}\n{VOICEOVER_IMPORTS}"), 1)
    } else {
        format!("{MANIM_IMPORT}\n{VOICEOVER_IMPORTS}\n\n{script}")
    }
}

fn to_voiceover_scene(script: &str) -> String {
    PLAIN_SCENE_CLASS_RE
        .replace_all(script, "class ${1}(VoiceoverScene):")
        .into_owned()
}

/// Check a model-produced voiceover script, patching in the imports and
/// base class when the model left them out.
pub fn ensure_voiceover(script: &str) -> String {
    if script.contains("VoiceoverScene") {
        return script.to_string();
    }
    tracing::warn!("Voiceover integration incomplete, VoiceoverScene not found");
    let script = if script.contains("from manim_voiceover") {
        script.to_string()
    } else {
        add_voiceover_imports(script)
    };
    to_voiceover_scene(&script)
}

/// Convert a plain Scene script to a narrated one without the model:
/// imports, base class and speech service set-up.
pub fn add_basic_voiceover_structure(script: &str) -> String {
    let script = to_voiceover_scene(&add_voiceover_imports(script));
    CONSTRUCT_LINE_RE
        .replace_all(&script, |caps: &Captures| {
            format!("{}{SPEECH_SERVICE_INIT}", &caps[1])
        })
        .into_owned()
}
