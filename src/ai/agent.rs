/// Universal interface for scripted agents acting on observations of type `O`.
pub trait Agent<O> {
    /// Select an action index given the latest observation, the reward received
    /// for the previous action and whether that action ended the episode.
    /// When `training` is true, the agent may explore; otherwise it exploits.
    fn act(&mut self, observation: &O, reward: f32, done: bool, training: bool) -> usize;

    /// Return the agent's display name.
    fn name(&self) -> &str;
}
