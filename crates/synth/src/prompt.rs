//! Prompt text for the three synthesis rounds.

/// Round 1: ask for a complete Manim scene explaining `topic`.
pub fn generation_prompt(topic: &str, duration_limit_secs: u32) -> String {
    format!(
        r##"Write a complete Manim script that explains: {topic}

Requirements:
- Start with `from manim import *`; add `import numpy as np` when vector maths is needed.
- Define exactly one class that inherits from Scene and implements construct(self).
  Narration is added in a later step, so do not use VoiceoverScene yet.
- Keep the animation between 10 and {duration_limit_secs} seconds and finish with self.wait(2).
- Prefer Text() over MathTex and stick to simple, reliable objects:
  Text, Circle, Rectangle, Square, Line, Arrow, NumberPlane, Axes.
- Group objects with Group(...) built from explicit members. Never write VGroup(*self.mobjects)
  and do not mix Mobject and VMobject types in one group.

Animations:
- Create(), Write() and FadeIn() only take individual objects. To animate a group use
  self.play(*[Create(obj) for obj in group]) or list the members explicitly.

Vectors:
- numpy arrays have no .normalize(). Normalise with v / np.linalg.norm(v).
- Always finish every expression; never leave a line incomplete.

Colours (use only these, or hex strings such as "#3498DB"):
RED, GREEN, BLUE, YELLOW, ORANGE, PURPLE, PINK, WHITE, BLACK, GRAY, GREY,
LIGHT_GRAY, DARK_GRAY, TEAL, MAROON, GOLD.

Return only the Python code, with no explanation and no markdown."##
    )
}

/// Round 2: ask the model to review and repair a generated script.
pub fn validation_prompt(script: &str) -> String {
    format!(
        r#"Review the Manim script below and fix everything that would stop it from running.

Check in particular:
- imports are correct (`from manim import *`, numpy as np when np. is used);
- there are no syntax errors, undefined names or unfinished lines;
- the scene class inherits from Scene and indentation is consistent;
- every colour is a valid Manim colour;
- Create(), Write() and FadeIn() are never applied to a group; animate members instead,
  for example self.play(*[Create(obj) for obj in group]);
- vectors are normalised with np.linalg.norm() rather than .normalize();
- every object is defined before it is used.

Script:
```python
{script}
```

Return only the corrected Python code, with no explanation and no markdown."#
    )
}

/// Round 3: ask the model to add synchronised narration to a script.
pub fn voiceover_prompt(script: &str, topic: &str) -> String {
    format!(
        r#"Add narrated voiceover to the Manim script below. The lesson topic is: "{topic}"

Make these changes:
1. The scene class inherits from VoiceoverScene instead of Scene.
2. Add `from manim_voiceover import VoiceoverScene` and
   `from manim_voiceover.services.azure import AzureService`.
3. At the top of construct(), call
   self.set_speech_service(AzureService(voice="en-US-JennyNeural", style="friendly")).
4. Wrap each animation sequence in `with self.voiceover(text="...") as tracker:` and time the
   animations with tracker.duration, for example
   self.play(Write(title), run_time=tracker.duration).
5. Narration should be clear, conversational and explain what appears on screen, with short
   self.wait() pauses where helpful.
6. Keep every visual element and animation that is already there.

Script:
```python
{script}
```

Return only the complete Python code, with no explanation and no markdown."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_prompt_carries_topic_and_duration() {
        let prompt = generation_prompt("the Fourier transform", 45);
        assert!(prompt.contains("explains: the Fourier transform"));
        assert!(prompt.contains("between 10 and 45 seconds"));
    }

    #[test]
    fn review_prompts_embed_the_script() {
        let script = "class A(Scene):\n    pass";
        assert!(validation_prompt(script).contains(script));
        let voiced = voiceover_prompt(script, "gravity");
        assert!(voiced.contains(script));
        assert!(voiced.contains("\"gravity\""));
    }
}
