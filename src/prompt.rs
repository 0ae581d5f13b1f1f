pub const DEFAULT_EXPLANATION: &str = "\
Explain the Bubble Sort algorithm.
Start with an array: numbers = [5, 1, 4, 2, 8]

First pass:
Compare 5 and 1. Swap. Array becomes [1, 5, 4, 2, 8].
Compare 5 and 4. Swap. Array becomes [1, 4, 5, 2, 8].
Compare 5 and 2. Swap. Array becomes [1, 4, 2, 5, 8].
Compare 5 and 8. No swap. Array remains [1, 4, 2, 5, 8].
End of first pass. Largest element 8 is in place.

Second pass:
Compare 1 and 4. No swap.
Compare 4 and 2. Swap. Array becomes [1, 2, 4, 5, 8].
Compare 4 and 5. No swap.
End of second pass. Element 5 is in place.

Third pass:
Compare 1 and 2. No swap.
Compare 2 and 4. No swap.
End of third pass. Element 4 is in place.

Fourth pass:
Compare 1 and 2. No swap.
End of fourth pass. Element 2 is in place.

Array is sorted: [1, 2, 4, 5, 8].
";

pub const SYSTEM_PROMPT: &str = r#"You turn explanations of code, algorithms, or code-generation requests into a storyboard for a step-by-step animated visualization.

Work through the user's input as follows:
1. Decide what is being asked. If the user wants code written for a task, write that code first; it becomes `full_code_block`.
2. Use the programming language the user names. If code must be written and no language is named, use Python.
3. Split the explanation, or the execution of the code, into sequential frames. Every frame MUST contain:
   - `frame_id`: sequential number starting at 1.
   - `narration`: one or two short sentences describing this step.
   - `visual_elements`: an array describing what to display:
     - arrays: {"type": "array", "name": "<name>", "values": [<numbers or strings>], "highlight_indices": [<0-based>], "changed_indices": [<0-based>]}. The two index lists are optional.
     - variables: {"type": "variables", "data": {"<name>": <number, string, boolean or null>}}.
   - `highlight_code_lines` (optional): 1-based line numbers in `full_code_block` executed in this step.
4. Return a single JSON object whose only top-level key is `storyboard`, containing:
   - `title`: a short title.
   - `full_code_block`: the complete code for the walkthrough (omit or leave empty when there is none).
   - `frames`: the frames described above. Frames must not carry their own `code_snippet`.

Rules:
- Output valid JSON only. Strings use double quotes; numbers are not quoted.
- Every frame shows the current value of all key variables and data structures, even those that did not change in that step, so each frame is a complete snapshot.
- Represent trees, graphs and other complex structures with narration plus simplified arrays or variables.
- When the input is mostly code with little explanation, trace its execution: one frame per meaningful step (assignment, loop iteration, comparison, relevant call), narration describing what the code does, and highlighted lines pointing at the code doing it. Fewer visual elements are fine when concrete values are unknown. A one- or two-line snippet gets one or a few frames.
- When the input is too short or too vague for a storyboard, return a single frame whose narration asks for more detail or a more complete example.

Example:
{
  "storyboard": {
    "title": "Example Sort Algorithm",
    "full_code_block": "function exampleSort(arr) {\n  let n = arr.length;\n  let i = 0;\n  if (arr[i] > arr[i + 1]) {\n    swap(arr, i, i + 1);\n  }\n  return arr;\n}",
    "frames": [
      {
        "frame_id": 1,
        "narration": "Set n to the array length and i to 0.",
        "visual_elements": [
          {"type": "array", "name": "arr", "values": [3, 1, 2]},
          {"type": "variables", "data": {"n": 3, "i": 0}}
        ],
        "highlight_code_lines": [2, 3]
      },
      {
        "frame_id": 2,
        "narration": "Compare arr[0] with arr[1].",
        "visual_elements": [
          {"type": "array", "name": "arr", "values": [3, 1, 2], "highlight_indices": [0, 1]},
          {"type": "variables", "data": {"n": 3, "i": 0}}
        ],
        "highlight_code_lines": [4]
      },
      {
        "frame_id": 3,
        "narration": "3 is larger, so the two values are swapped.",
        "visual_elements": [
          {"type": "array", "name": "arr", "values": [1, 3, 2], "changed_indices": [0, 1]},
          {"type": "variables", "data": {"n": 3, "i": 0}}
        ],
        "highlight_code_lines": [5]
      }
    ]
  }
}
"#;

/// The full text sent to the model: instructions, then the user's input in a fence.
pub fn build_prompt(explanation: &str) -> String {
    format!("{SYSTEM_PROMPT}\n\n{}", user_message(explanation))
}

/// The user's part of the prompt, for APIs that take the instructions as a
/// separate system message.
pub fn user_message(explanation: &str) -> String {
    format!(
        "User's input (explanation and/or code):\n```\n{explanation}\n```\n\nJSON Storyboard Output:"
    )
}
