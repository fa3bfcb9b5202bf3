//! Landmark table: every UI element the macro can look for, with its
//! reference image path and per-landmark confidence floor.
//!
//! Paths are relative to the application directory so a packaged build finds
//! the same `buttons/` and `unit stuff/` trees an editor install uses.

/// A named UI landmark.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Landmark {
    // Lobby / navigation
    Areas,
    Story,
    CloseMenu,
    CreateMatch,
    Start,
    OtherStart,
    Legend,
    Nightmare,
    Raids,
    Siege,
    Challenges,
    Regular,
    Trait,
    ReturnToLobby,

    // Stage selection
    Leaf,
    Planet,
    Hollow,
    FrozenGate,
    BlueDungeon,
    Act(u8),

    // In-match
    Yes,
    Victory,
    Defeat,
    ClickPrompt,
    Replay,
    Disconnect,

    // Unit panel
    UpgradePanel,
    AutoUpgrade,
    UpgradeLevel(u8),
    UpgradeMax,

    // Challenge map detection
    ChallengeLeaf,
    ChallengePlanet,
    ChallengeDark,
}

impl Landmark {
    /// Asset path relative to the application directory.
    pub fn asset(&self) -> String {
        match self {
            Landmark::Areas => "buttons/Areas.png".into(),
            Landmark::Story => "buttons/Story.png".into(),
            Landmark::CloseMenu => "buttons/X.png".into(),
            Landmark::CreateMatch => "buttons/creatematch.png".into(),
            Landmark::Start => "buttons/Start.png".into(),
            Landmark::OtherStart => "buttons/otherstart.png".into(),
            Landmark::Legend => "buttons/Legend.png".into(),
            Landmark::Nightmare => "buttons/nightmare.png".into(),
            Landmark::Raids => "buttons/raids.png".into(),
            Landmark::Siege => "buttons/siege.png".into(),
            Landmark::Challenges => "buttons/challenges.png".into(),
            Landmark::Regular => "buttons/regular.png".into(),
            Landmark::Trait => "buttons/trait.png".into(),
            Landmark::ReturnToLobby => "buttons/return.png".into(),
            Landmark::Leaf => "buttons/leaf.png".into(),
            Landmark::Planet => "buttons/planet.png".into(),
            Landmark::Hollow => "buttons/hollow.png".into(),
            Landmark::FrozenGate => "buttons/Frozen.png".into(),
            Landmark::BlueDungeon => "buttons/Blue.png".into(),
            Landmark::Act(n) => format!("buttons/Acts/act{}.png", n),
            Landmark::Yes => "buttons/Yes.png".into(),
            Landmark::Victory => "buttons/victory.png".into(),
            Landmark::Defeat => "buttons/defeat.png".into(),
            Landmark::ClickPrompt => "buttons/click.png".into(),
            Landmark::Replay => "buttons/replay.png".into(),
            Landmark::Disconnect => "buttons/disconnect.png".into(),
            Landmark::UpgradePanel => "unit stuff/upg.png".into(),
            Landmark::AutoUpgrade => "buttons/autoupg.png".into(),
            Landmark::UpgradeLevel(n) => format!("unit stuff/upg{}.png", n),
            Landmark::UpgradeMax => "unit stuff/upgmax.png".into(),
            Landmark::ChallengeLeaf => "buttons/challengeacts/leaf.png".into(),
            Landmark::ChallengePlanet => "buttons/challengeacts/planet.png".into(),
            Landmark::ChallengeDark => "buttons/challengeacts/dark.png".into(),
        }
    }

    /// Confidence floor for this landmark.
    ///
    /// Most UI buttons sit at the default. The exceptions were tuned against
    /// real captures: the Hollow stage art varies with lighting (lower), the
    /// upgrade level digits must never false-positive (much higher), and the
    /// auto-upgrade toggle renders semi-transparent (lower).
    pub fn confidence(&self, default: f32) -> f32 {
        match self {
            Landmark::Hollow => 0.50,
            Landmark::AutoUpgrade => 0.55,
            Landmark::CloseMenu => 0.60,
            Landmark::Disconnect | Landmark::UpgradePanel => 0.70,
            Landmark::UpgradeMax => 0.75,
            Landmark::UpgradeLevel(_) => 0.90,
            _ => default,
        }
    }
}
