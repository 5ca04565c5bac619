/// Class name of the canned scene.
pub const FALLBACK_SCENE_CLASS: &str = "FallbackScene";

const TITLE_CHARS: usize = 50;
const NARRATION_CHARS: usize = 100;

/// A fixed narrated scene that mentions the prompt, used when the model
/// cannot produce a script in time.
pub fn fallback_script(prompt: &str) -> String {
    let topic = escape_python(&truncate_chars(prompt, TITLE_CHARS));
    let narration = escape_python(&truncate_chars(prompt, NARRATION_CHARS));
    format!(
        r#"from manim import *
from manim_voiceover import VoiceoverScene
from manim_voiceover.services.azure import AzureService
import numpy as np

class {FALLBACK_SCENE_CLASS}(VoiceoverScene):
    def construct(self):
        self.set_speech_service(
            AzureService(
                voice="en-US-JennyNeural",
                style="friendly"
            )
        )

        title = Text("Educational Video", font_size=48, color=BLUE)
        with self.voiceover(text="Welcome to this educational video presentation.") as tracker:
            self.play(Write(title), run_time=tracker.duration)

        topic = Text("{topic}...", font_size=32, color=WHITE)
        topic.next_to(title, DOWN, buff=1)
        with self.voiceover(text="Today we will explore: {narration}") as tracker:
            self.play(Write(topic), run_time=tracker.duration)

        circle = Circle(radius=1, color=YELLOW)
        circle.next_to(topic, DOWN, buff=1)
        with self.voiceover(text="Let me demonstrate this concept with a simple visual example.") as tracker:
            self.play(Create(circle), run_time=tracker.duration - 1)
            self.wait(1)

        with self.voiceover(text="Notice how the shape transforms to emphasize key points.") as tracker:
            self.play(circle.animate.scale(1.5), run_time=tracker.duration / 2)
            self.play(circle.animate.scale(0.8), run_time=tracker.duration / 2)

        conclusion = Text("Thank you for watching!", font_size=24, color=GREEN)
        conclusion.next_to(circle, DOWN, buff=1)
        with self.voiceover(text="Thank you for watching this educational presentation!") as tracker:
            self.play(Write(conclusion), run_time=tracker.duration)

        all_objects = Group(title, topic, circle, conclusion)
        self.play(FadeOut(all_objects))
        self.wait(2)
"#
    )
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Make `text` safe inside a double-quoted Python string literal.
fn escape_python(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' | '\r' | '\t' => out.push(' '),
            c => out.push(c),
        }
    }
    out
}
