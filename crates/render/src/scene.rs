use std::sync::LazyLock;

use regex::Regex;

/// Class name Manim falls back to when none can be found.
pub const DEFAULT_SCENE_CLASS: &str = "Scene";

/// Tried in order; the first match wins.
static SCENE_CLASS_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"class\s+(\w+)\s*\([^)]*(?:Voiceover)?Scene[^)]*\):").expect("valid regex"),
        Regex::new(r"class\s+(\w+)\s*\([^)]*Scene[^)]*\):").expect("valid regex"),
        Regex::new(r"class\s+(\w*Scene\w*)\s*\([^)]*\):").expect("valid regex"),
    ]
});

/// Name of the scene class a script defines, for the Manim command line.
pub fn extract_scene_class(script: &str) -> String {
    SCENE_CLASS_PATTERNS
        .iter()
        .find_map(|re| re.captures(script))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| {
            tracing::warn!("Could not extract scene class name, using default");
            DEFAULT_SCENE_CLASS.to_string()
        })
}
