//! Sequential achievement presentation.
//!
//! Badges are shown one at a time in arrival order. Each stays visible until
//! dismissed or until its display time runs out, then the next appears after
//! a short gap.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use bazaar_common::wire::BadgePayload;

#[derive(Debug, Clone, PartialEq)]
pub enum AchievementChange {
    Shown(BadgePayload),
    Dismissed { badge_id: String },
}

#[derive(Debug)]
struct Visible {
    badge: BadgePayload,
    dismiss_at: Instant,
}

#[derive(Debug)]
pub struct AchievementQueue {
    display: Duration,
    gap: Duration,
    pending: VecDeque<BadgePayload>,
    visible: Option<Visible>,
    /// Nothing may appear before this instant.
    next_show_at: Option<Instant>,
}

impl AchievementQueue {
    pub fn new(display: Duration, gap: Duration) -> Self {
        Self {
            display,
            gap,
            pending: VecDeque::new(),
            visible: None,
            next_show_at: None,
        }
    }

    pub fn push(&mut self, badge: BadgePayload, now: Instant) -> Vec<AchievementChange> {
        self.pending.push_back(badge);
        self.advance(now)
    }

    /// User closed the visible achievement.
    pub fn dismiss(&mut self, now: Instant) -> Vec<AchievementChange> {
        let mut changes = Vec::new();
        if let Some(visible) = self.visible.take() {
            self.next_show_at = Some(now + self.gap);
            changes.push(AchievementChange::Dismissed {
                badge_id: visible.badge.badge_id,
            });
        }
        changes.extend(self.advance(now));
        changes
    }

    /// Fire whatever deadlines have passed.
    pub fn tick(&mut self, now: Instant) -> Vec<AchievementChange> {
        let mut changes = Vec::new();
        if self.visible.as_ref().is_some_and(|v| v.dismiss_at <= now) {
            if let Some(visible) = self.visible.take() {
                self.next_show_at = Some(visible.dismiss_at + self.gap);
                changes.push(AchievementChange::Dismissed {
                    badge_id: visible.badge.badge_id,
                });
            }
        }
        changes.extend(self.advance(now));
        changes
    }

    fn advance(&mut self, now: Instant) -> Vec<AchievementChange> {
        if self.visible.is_some() || self.next_show_at.is_some_and(|at| at > now) {
            return Vec::new();
        }
        let Some(badge) = self.pending.pop_front() else {
            return Vec::new();
        };
        self.next_show_at = None;
        self.visible = Some(Visible {
            badge: badge.clone(),
            dismiss_at: now + self.display,
        });
        vec![AchievementChange::Shown(badge)]
    }

    pub fn visible(&self) -> Option<&BadgePayload> {
        self.visible.as_ref().map(|v| &v.badge)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match &self.visible {
            Some(visible) => Some(visible.dismiss_at),
            None if !self.pending.is_empty() => self.next_show_at,
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DISPLAY: Duration = Duration::from_secs(5);
    const GAP: Duration = Duration::from_millis(750);

    fn badge(id: &str) -> BadgePayload {
        BadgePayload {
            badge_id: id.into(),
            name: id.to_uppercase(),
            icon: "star".into(),
            description: String::new(),
        }
    }

    fn shown(changes: &[AchievementChange]) -> Vec<String> {
        changes
            .iter()
            .filter_map(|c| match c {
                AchievementChange::Shown(b) => Some(b.badge_id.clone()),
                AchievementChange::Dismissed { .. } => None,
            })
            .collect()
    }

    #[test]
    fn three_badges_play_in_order_one_at_a_time() {
        let mut queue = AchievementQueue::new(DISPLAY, GAP);
        let t0 = Instant::now();

        let mut order = shown(&queue.push(badge("b1"), t0));
        order.extend(shown(&queue.push(badge("b2"), t0)));
        order.extend(shown(&queue.push(badge("b3"), t0)));
        assert_eq!(order, vec!["b1"]);
        assert_eq!(queue.pending_len(), 2);

        // Walk the clock forward by deadlines only.
        let mut now = t0;
        while let Some(deadline) = queue.next_deadline() {
            now = deadline;
            order.extend(shown(&queue.tick(now)));
        }

        assert_eq!(order, vec!["b1", "b2", "b3"]);
        assert_eq!(now, t0 + DISPLAY * 3 + GAP * 2);
    }

    #[test]
    fn auto_dismiss_after_display_time() {
        let mut queue = AchievementQueue::new(DISPLAY, GAP);
        let t0 = Instant::now();
        queue.push(badge("b1"), t0);

        assert!(queue.tick(t0 + Duration::from_millis(4999)).is_empty());
        assert_eq!(
            queue.tick(t0 + DISPLAY),
            vec![AchievementChange::Dismissed {
                badge_id: "b1".into()
            }]
        );
        assert!(queue.visible().is_none());
        assert!(queue.next_deadline().is_none());
    }

    #[test]
    fn manual_dismiss_starts_gap_before_next() {
        let mut queue = AchievementQueue::new(DISPLAY, GAP);
        let t0 = Instant::now();
        queue.push(badge("b1"), t0);
        queue.push(badge("b2"), t0);

        let t1 = t0 + Duration::from_secs(1);
        assert_eq!(
            queue.dismiss(t1),
            vec![AchievementChange::Dismissed {
                badge_id: "b1".into()
            }]
        );
        assert_eq!(queue.next_deadline(), Some(t1 + GAP));
        assert!(queue.tick(t1 + GAP / 2).is_empty());
        assert_eq!(shown(&queue.tick(t1 + GAP)), vec!["b2"]);
    }

    #[test]
    fn badge_arriving_while_idle_shows_immediately() {
        let mut queue = AchievementQueue::new(DISPLAY, GAP);
        let t0 = Instant::now();
        queue.push(badge("b1"), t0);
        queue.tick(t0 + DISPLAY);

        // Well past the gap.
        let later = t0 + Duration::from_secs(60);
        assert_eq!(shown(&queue.push(badge("b2"), later)), vec!["b2"]);
    }
}
