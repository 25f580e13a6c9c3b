use crate::models::Campaign;
use std::time::Duration;

/// How long each campaign stays on screen before the portal rotates.
pub const ROTATE_INTERVAL: Duration = Duration::from_secs(5);

/// Circular rotation over the campaigns currently showing.
#[derive(Debug, Clone, Default)]
pub struct Carousel {
    campaigns: Vec<Campaign>,
    index: usize,
}

impl Carousel {
    pub fn new(campaigns: Vec<Campaign>) -> Self {
        Carousel {
            campaigns,
            index: 0,
        }
    }

    /// Replaces the eligible list and starts again from the first campaign.
    pub fn reset(&mut self, campaigns: Vec<Campaign>) {
        self.campaigns = campaigns;
        self.index = 0;
    }

    pub fn len(&self) -> usize {
        self.campaigns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.campaigns.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn campaigns(&self) -> &[Campaign] {
        &self.campaigns
    }

    pub fn current(&self) -> Option<&Campaign> {
        self.campaigns.get(self.index)
    }

    /// Timer advance. Does nothing unless there is something to rotate to.
    pub fn tick(&mut self) {
        if self.len() > 1 {
            self.index = (self.index + 1) % self.len();
        }
    }

    pub fn next(&mut self) {
        if !self.is_empty() {
            self.index = (self.index + 1) % self.len();
        }
    }

    pub fn prev(&mut self) {
        if !self.is_empty() {
            self.index = (self.index + self.len() - 1) % self.len();
        }
    }

    /// Shows campaign `k`, clamped to the last one.
    pub fn jump(&mut self, k: usize) {
        if !self.is_empty() {
            self.index = k.min(self.len() - 1);
        }
    }

    /// Index the carousel would land on after `step`, without moving it.
    pub fn peek(&self, step: impl FnOnce(&mut Carousel)) -> usize {
        let mut probe = self.clone();
        step(&mut probe);
        probe.index
    }
}
