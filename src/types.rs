use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A decoded record together with the exact bytes the upstream sent.
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    pub record: T,
    pub raw: Vec<u8>,
}

impl<T> Fetched<T> {
    pub fn new(record: T, raw: Vec<u8>) -> Self {
        Self { record, raw }
    }
}

/// summoner-v4 `SummonerDTO`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summoner {
    pub id: String,
    pub account_id: String,
    pub puuid: String,
    pub name: String,
    pub profile_icon_id: i64,
    /// Epoch milliseconds of the last profile change
    pub revision_date: i64,
    pub summoner_level: i64,
}

impl Summoner {
    pub fn revised_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.revision_date).single()
    }
}

/// match-v5 `MatchDto`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchData {
    pub metadata: MatchMetadata,
    pub info: MatchInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchMetadata {
    pub data_version: String,
    pub match_id: String,
    /// Participant puuids
    pub participants: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchInfo {
    pub game_creation: i64,
    pub game_duration: i64,
    #[serde(default)]
    pub game_end_timestamp: Option<i64>,
    pub game_id: i64,
    pub game_mode: String,
    #[serde(default)]
    pub game_start_timestamp: Option<i64>,
    pub game_type: String,
    pub game_version: String,
    pub map_id: i64,
    pub participants: Vec<Participant>,
    pub platform_id: String,
    pub queue_id: i64,
    pub teams: Vec<Team>,
    #[serde(default)]
    pub tournament_code: Option<String>,
}

impl MatchInfo {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.game_creation).single()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub participant_id: i64,
    pub puuid: String,
    pub summoner_id: String,
    pub summoner_name: String,
    pub summoner_level: i64,
    pub team_id: i64,
    pub champion_id: i64,
    pub champion_name: String,
    pub champ_level: i64,
    // teamPosition is the better guess when both are present
    pub individual_position: String,
    pub team_position: String,
    pub lane: String,
    pub role: String,
    pub kills: i64,
    pub deaths: i64,
    pub assists: i64,
    pub gold_earned: i64,
    pub gold_spent: i64,
    pub total_minions_killed: i64,
    pub neutral_minions_killed: i64,
    pub total_damage_dealt_to_champions: i64,
    pub total_damage_taken: i64,
    pub vision_score: i64,
    pub wards_placed: i64,
    pub wards_killed: i64,
    #[serde(rename = "timeCCingOthers")]
    pub time_ccing_others: i64,
    #[serde(rename = "totalTimeCCDealt")]
    pub total_time_cc_dealt: i64,
    pub time_played: i64,
    pub win: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub team_id: i64,
    pub win: bool,
    pub bans: Vec<Ban>,
    pub objectives: Objectives,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ban {
    pub champion_id: i64,
    pub pick_turn: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Objectives {
    pub baron: Objective,
    pub champion: Objective,
    pub dragon: Objective,
    pub inhibitor: Objective,
    pub rift_herald: Objective,
    pub tower: Objective,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Objective {
    pub first: bool,
    pub kills: i64,
}
