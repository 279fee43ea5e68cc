//! Canvas fixtures shared across integration tests.

use storyloom::artifacts::{EpisodeBeat, Shot};
use storyloom::canvas::{Canvas, Node, NodePayload, StoryboardState};
use storyloom::types::{PipelineStage, Position, StyleContext};

pub fn planner(id: &str, idea: &str) -> Node {
    Node::new(id, Position::default(), NodePayload::script_planner(idea))
}

pub fn planner_with_outline(id: &str, outline: &str) -> Node {
    Node::new(
        id,
        Position::default(),
        NodePayload::ScriptPlanner {
            idea: "seed idea".into(),
            style: StyleContext::new("watercolor", "fable", "harbor town"),
            outline: Some(outline.to_string()),
        },
    )
}

pub fn episode_with_script(id: &str, script: &str) -> Node {
    Node::new(
        id,
        Position::default(),
        NodePayload::EpisodeScript {
            beat: EpisodeBeat::new(1, "Episode 1", "opening beat"),
            script: Some(script.to_string()),
        },
    )
}

pub fn shot_planner_with_shots(id: &str, durations: &[f64]) -> Node {
    let shots = durations
        .iter()
        .enumerate()
        .map(|(i, d)| Shot::new(i + 1, format!("shot {}", i + 1), *d))
        .collect();
    Node::new(
        id,
        Position::default(),
        NodePayload::ShotPlanner { shots },
    )
}

pub fn storyboard(id: &str, state: StoryboardState) -> Node {
    Node::new(
        id,
        Position::default(),
        NodePayload::StoryboardBatch(state),
    )
}

/// Planner → episode script → shot planner → storyboard, with the storyboard
/// at the given stage.
pub fn storyboard_canvas(stage: PipelineStage, durations: &[f64]) -> Canvas {
    let state = StoryboardState {
        stage,
        ..StoryboardState::default()
    };
    Canvas::builder()
        .with_node(planner_with_outline("planner", "three-act outline"))
        .with_node(episode_with_script("episode", "INT. LIGHTHOUSE - NIGHT"))
        .with_node(shot_planner_with_shots("shots", durations))
        .with_node(storyboard("board", state))
        .with_edge("planner", "episode")
        .with_edge("episode", "shots")
        .with_edge("shots", "board")
        .build()
}
