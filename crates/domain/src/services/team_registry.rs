use std::sync::Arc;

use gigmarket_core::{MarketError, MarketResult};
use tracing::{error, info, instrument};

use crate::entities::{Team, TeamRoster};
use crate::repositories::{TeamRepository, UserDirectory};

/// 团队身份、成员名单与负责人
pub struct TeamRegistry {
    teams: Arc<dyn TeamRepository>,
    users: Arc<dyn UserDirectory>,
}

impl TeamRegistry {
    pub fn new(teams: Arc<dyn TeamRepository>, users: Arc<dyn UserDirectory>) -> Self {
        Self { teams, users }
    }

    async fn load_team(&self, team_id: i64) -> MarketResult<Team> {
        match self.teams.find_by_id(team_id).await? {
            Some(team) => Ok(team),
            None => {
                error!("团队不存在，订单与团队的关联已损坏: team_id={}", team_id);
                Err(MarketError::TeamNotFound { id: team_id })
            }
        }
    }

    /// 团队及其负责人和按加入顺序排列的成员资料
    #[instrument(skip(self), fields(team_id = %team_id))]
    pub async fn get_team_with_members(&self, team_id: i64) -> MarketResult<TeamRoster> {
        let team = self.load_team(team_id).await?;
        self.roster_of(&team).await
    }

    pub async fn roster_of(&self, team: &Team) -> MarketResult<TeamRoster> {
        let performers = self.users.find_profiles(&team.members).await?;
        let lead = match team.lead_id {
            Some(lead_id) => self.users.find_profile(lead_id).await?,
            None => None,
        };

        Ok(TeamRoster {
            id: team.id,
            name: team.name.clone(),
            lead,
            performers,
        })
    }

    /// 订单所属客户从团队成员中指定负责人，之后团队不再接受新成员
    #[instrument(skip(self), fields(team_id = %team_id, customer_id = %customer_id))]
    pub async fn assign_team_lead(
        &self,
        team_id: i64,
        customer_id: i64,
        performer_id: i64,
    ) -> MarketResult<TeamRoster> {
        let mut team = self.load_team(team_id).await?;

        if team.customer_id != customer_id {
            return Err(MarketError::NotTeamOwner {
                team_id,
                customer_id,
            });
        }
        if !team.is_open() {
            return Err(MarketError::TeamLeadAlreadySet { team_id });
        }
        if !team.has_member(performer_id) {
            return Err(MarketError::NotTeamMember {
                team_id,
                performer_id,
            });
        }
        if !self.teams.assign_lead(team_id, performer_id).await? {
            return Err(MarketError::TeamLeadAlreadySet { team_id });
        }

        info!("团队 {} 的负责人已确定为 {}", team.name, performer_id);
        team.lead_id = Some(performer_id);
        self.roster_of(&team).await
    }
}
