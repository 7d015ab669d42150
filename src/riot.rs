//! Riot API client for the tracked player's ranked stats.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{BotError, Result};

const TOKEN_ENV: &str = "RIOT_TOKEN";
const REGION: &str = "americas";
const PLATFORM: &str = "na1";
const DDRAGON: &str = "https://ddragon.leagueoflegends.com";

#[derive(Debug, Clone)]
pub struct RiotId {
    pub name: String,
    pub tag: String,
}

#[derive(Debug, Clone)]
pub struct Account {
    pub name: String,
    pub tag: String,
    pub puuid: String,
    pub icon_url: String,
    pub rank: String,
    pub rank_url: String,
    pub wins: i32,
    pub losses: i32,
    pub points: i32,
}

impl Account {
    pub fn winrate(&self) -> i32 {
        let total = self.wins + self.losses;
        if total == 0 {
            0
        } else {
            self.wins * 100 / total
        }
    }
}

#[derive(Debug, Clone)]
pub struct Match {
    pub kills: i32,
    pub deaths: i32,
    pub assists: i32,
    pub won: bool,
    pub champion: i64,
    pub time: DateTime<Utc>,
}

impl Match {
    pub fn kill_death_ratio(&self) -> f64 {
        if self.deaths == 0 {
            self.kills as f64
        } else {
            self.kills as f64 / self.deaths as f64
        }
    }

    /// Orders matches worst-to-best: kills first, K/D as a tiebreak, then a
    /// win beats a loss.
    pub fn cmp_performance(&self, other: &Self) -> Ordering {
        self.kills
            .cmp(&other.kills)
            .then_with(|| self.kill_death_ratio().total_cmp(&other.kill_death_ratio()))
            .then_with(|| self.won.cmp(&other.won))
    }
}

#[derive(Debug, Clone)]
pub struct Champion {
    /// Data Dragon slug, used in icon URLs.
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy)]
pub struct Mastery {
    pub champion_id: i64,
    pub points: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountDto {
    puuid: String,
    game_name: String,
    tag_line: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummonerDto {
    id: String,
    profile_icon_id: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeagueEntryDto {
    tier: String,
    rank: String,
    league_points: i32,
    wins: i32,
    losses: i32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MasteryDto {
    champion_id: i64,
    champion_points: i64,
}

#[derive(Deserialize)]
struct MatchDto {
    info: MatchInfoDto,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MatchInfoDto {
    game_end_timestamp: i64,
    participants: Vec<ParticipantDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParticipantDto {
    puuid: String,
    kills: i32,
    deaths: i32,
    assists: i32,
    win: bool,
    champion_id: i64,
}

#[derive(Deserialize)]
struct ChampionListDto {
    data: HashMap<String, ChampionEntryDto>,
}

#[derive(Deserialize)]
struct ChampionEntryDto {
    id: String,
    key: String,
    name: String,
}

pub struct Client {
    http: reqwest::Client,
    token: String,
    riot_id: RiotId,
    version: String,
    champions: HashMap<i64, Champion>,
}

impl Client {
    /// Resolves the current Data Dragon version and champion roster up front;
    /// both are needed for every embed and rarely change.
    pub async fn new(riot_id: RiotId, timeout: Duration) -> Result<Self> {
        let token = std::env::var(TOKEN_ENV)
            .map_err(|_| BotError::Riot(format!("{TOKEN_ENV} not set in environment")))?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        let versions: Vec<String> = http
            .get(format!("{DDRAGON}/api/versions.json"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let version = versions
            .into_iter()
            .next()
            .ok_or_else(|| BotError::Riot("empty Data Dragon version list".into()))?;

        let list: ChampionListDto = http
            .get(format!("{DDRAGON}/cdn/{version}/data/en_US/champion.json"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let mut champions = HashMap::new();
        for entry in list.data.into_values() {
            let key: i64 = entry
                .key
                .parse()
                .map_err(|_| BotError::Riot(format!("bad champion key {}", entry.key)))?;
            champions.insert(
                key,
                Champion {
                    slug: entry.id,
                    name: entry.name,
                },
            );
        }

        Ok(Self {
            http,
            token,
            riot_id,
            version,
            champions,
        })
    }

    pub fn riot_id(&self) -> &RiotId {
        &self.riot_id
    }

    async fn get<T: DeserializeOwned>(&self, url: String) -> Result<T> {
        Ok(self
            .http
            .get(url)
            .header("X-Riot-Token", &self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    pub fn champion_by_id(&self, id: i64) -> Result<&Champion> {
        self.champions
            .get(&id)
            .ok_or_else(|| BotError::Riot(format!("unknown champion id {id}")))
    }

    pub fn champion_icon_url(&self, champion: &Champion) -> String {
        format!(
            "{DDRAGON}/cdn/{}/img/champion/{}.png",
            self.version, champion.slug
        )
    }

    pub async fn tracked_account(&self) -> Result<Account> {
        self.account_by_riot_id(&self.riot_id.name, &self.riot_id.tag)
            .await
    }

    pub async fn account_by_riot_id(&self, name: &str, tag: &str) -> Result<Account> {
        let account: AccountDto = self
            .get(format!(
                "https://{REGION}.api.riotgames.com/riot/account/v1/accounts/by-riot-id/{name}/{tag}"
            ))
            .await?;
        let summoner: SummonerDto = self
            .get(format!(
                "https://{PLATFORM}.api.riotgames.com/lol/summoner/v4/summoners/by-puuid/{}",
                account.puuid
            ))
            .await?;
        let entries: Vec<LeagueEntryDto> = self
            .get(format!(
                "https://{PLATFORM}.api.riotgames.com/lol/league/v4/entries/by-summoner/{}",
                summoner.id
            ))
            .await?;
        let entry = entries
            .into_iter()
            .next()
            .ok_or_else(|| BotError::Riot("account has no ranked entries".into()))?;

        let tier = prettify_tier(&entry.tier);
        Ok(Account {
            name: account.game_name,
            tag: account.tag_line,
            puuid: account.puuid,
            icon_url: format!(
                "{DDRAGON}/cdn/{}/img/profileicon/{}.png",
                self.version, summoner.profile_icon_id
            ),
            rank: format!("{tier} {}", entry.rank),
            rank_url: format!(
                "https://raw.communitydragon.org/latest/plugins/rcp-fe-lol-shared-components/global/default/{}.png",
                tier.to_lowercase()
            ),
            wins: entry.wins,
            losses: entry.losses,
            points: entry.league_points,
        })
    }

    pub async fn top_mastery(&self, account: &Account) -> Result<Mastery> {
        let masteries: Vec<MasteryDto> = self
            .get(format!(
                "https://{PLATFORM}.api.riotgames.com/lol/champion-mastery/v4/champion-masteries/by-puuid/{}/top?count=1",
                account.puuid
            ))
            .await?;
        let top = masteries
            .into_iter()
            .next()
            .ok_or_else(|| BotError::Riot("account has no champion masteries".into()))?;
        Ok(Mastery {
            champion_id: top.champion_id,
            points: top.champion_points,
        })
    }

    pub async fn ranked_matches_since(
        &self,
        account: &Account,
        since: DateTime<Utc>,
    ) -> Result<Vec<Match>> {
        let ids: Vec<String> = self
            .get(format!(
                "https://{REGION}.api.riotgames.com/lol/match/v5/matches/by-puuid/{}/ids?startTime={}&endTime={}&type=ranked&start=0&count=100",
                account.puuid,
                since.timestamp(),
                Utc::now().timestamp()
            ))
            .await?;

        let mut matches = Vec::with_capacity(ids.len());
        for id in ids {
            let dto: MatchDto = self
                .get(format!(
                    "https://{REGION}.api.riotgames.com/lol/match/v5/matches/{id}"
                ))
                .await?;
            let player = dto
                .info
                .participants
                .into_iter()
                .find(|p| p.puuid == account.puuid)
                .ok_or_else(|| {
                    BotError::Riot(format!("tracked player missing from match {id}"))
                })?;
            matches.push(Match {
                kills: player.kills,
                deaths: player.deaths,
                assists: player.assists,
                won: player.win,
                champion: player.champion_id,
                time: DateTime::from_timestamp_millis(dto.info.game_end_timestamp)
                    .unwrap_or_default(),
            });
        }
        Ok(matches)
    }
}

/// "GOLD" -> "Gold", matching the display casing Data Dragon assets use.
fn prettify_tier(tier: &str) -> String {
    let mut chars = tier.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(kills: i32, deaths: i32, won: bool) -> Match {
        Match {
            kills,
            deaths,
            assists: 0,
            won,
            champion: 1,
            time: Utc::now(),
        }
    }

    #[test]
    fn performance_prefers_kills_then_kd_then_win() {
        let low = game(2, 5, true);
        let high = game(10, 5, false);
        assert_eq!(low.cmp_performance(&high), Ordering::Less);

        let fed = game(5, 1, false);
        let even = game(5, 5, false);
        assert_eq!(even.cmp_performance(&fed), Ordering::Less);

        let won = game(5, 5, true);
        let lost = game(5, 5, false);
        assert_eq!(lost.cmp_performance(&won), Ordering::Less);
        assert_eq!(won.cmp_performance(&won.clone()), Ordering::Equal);
    }

    #[test]
    fn kd_handles_zero_deaths() {
        assert_eq!(game(4, 0, true).kill_death_ratio(), 4.0);
    }

    #[test]
    fn winrate_is_whole_percent() {
        let account = Account {
            name: String::new(),
            tag: String::new(),
            puuid: String::new(),
            icon_url: String::new(),
            rank: String::new(),
            rank_url: String::new(),
            wins: 2,
            losses: 1,
            points: 0,
        };
        assert_eq!(account.winrate(), 66);
    }

    #[test]
    fn tier_casing() {
        assert_eq!(prettify_tier("GOLD"), "Gold");
        assert_eq!(prettify_tier("IRON"), "Iron");
        assert_eq!(prettify_tier(""), "");
    }
}
