// ============================================================================
// SERVICE : REDEMPTION (passage à la mess)
// ============================================================================
//
// Enchaînement, arrêt au premier refus:
//   1. Vérification du token (meal QR ou QR personnel), jour local de la
//      mess et fenêtre horaire du repas
//   2. Éligibilité (abonnement + confirmation si la mess l'exige)
//   3. Géofence (refus journalisé pour audit)
//   4. Écriture dans le journal des présences (seul point de commit)
//
// Chaque aller-retour vers le stockage a une deadline : au-delà, le passage
// est un échec transitoire (RedemptionError::Transient), jamais un refus.
// L'étape 4 tourne dans une tâche tokio séparée : si l'appelant abandonne,
// l'écriture va quand même au bout.
//
// ============================================================================

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{FixedOffset, NaiveDate};
use sea_orm::{DatabaseConnection, EntityTrait};
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::error::{RedemptionError, RedemptionRejection, TokenRejection};
use crate::models::attendance::{self, ScanMethod};
use crate::models::meal_type::MealType;
use crate::models::mess;
use crate::services::attendance_ledger::{AttendanceLedger, LedgerOutcome, NewAttendance};
use crate::services::geofence::{self, GeoPoint, ProximityRejection};
use crate::services::subscription_gate::SubscriptionGate;
use crate::services::token_store::MealTokenStore;
use crate::services::token_verifier::TokenVerifier;

#[derive(Debug, Clone, PartialEq)]
pub enum RedemptionOutcome {
    Redeemed(attendance::Model),
    Rejected(RedemptionRejection),
}

/// Tentative authentifiée, prête pour les contrôles métier
struct Attempt {
    user_id: i32,
    mess_id: i32,
    meal_type: MealType,
    date: NaiveDate,
    method: ScanMethod,
    location: Option<GeoPoint>,
    /// Code du meal QR à consommer au commit (None pour un QR personnel)
    claim: Option<String>,
}

#[derive(Clone)]
pub struct RedemptionService {
    db: DatabaseConnection,
    verifier: TokenVerifier,
    tokens: Arc<dyn MealTokenStore>,
    clock: Arc<dyn Clock>,
    storage_timeout: Duration,
    utc_offset: FixedOffset,
    clock_skew: chrono::Duration,
}

impl RedemptionService {
    pub fn new(
        db: DatabaseConnection,
        verifier: TokenVerifier,
        tokens: Arc<dyn MealTokenStore>,
        clock: Arc<dyn Clock>,
        storage_timeout: Duration,
        utc_offset: FixedOffset,
        clock_skew: chrono::Duration,
    ) -> Self {
        Self {
            db,
            verifier,
            tokens,
            clock,
            storage_timeout,
            utc_offset,
            clock_skew,
        }
    }

    /// L'abonné scanne le QR affiché par la mess
    pub async fn redeem_meal_token(
        &self,
        user_id: i32,
        code: &str,
        location: Option<GeoPoint>,
        meal_hint: Option<MealType>,
    ) -> Result<RedemptionOutcome, RedemptionError> {
        let verified = match self.verifier.verify_meal_token(code).await {
            Ok(verified) => verified,
            Err(reason) => return Ok(invalid_token(Some(user_id), reason)),
        };

        // Le repas annoncé par le client doit être celui du QR
        if meal_hint.is_some_and(|hint| hint != verified.meal_type) {
            return Ok(invalid_token(Some(user_id), TokenRejection::NotFound));
        }

        self.redeem(Attempt {
            user_id,
            mess_id: verified.mess_id,
            meal_type: verified.meal_type,
            date: verified.date,
            method: ScanMethod::MealQr,
            location,
            claim: Some(verified.code),
        })
        .await
    }

    /// Le poste de la mess scanne le QR personnel de l'abonné
    pub async fn redeem_user_token(
        &self,
        mess_id: i32,
        code: &str,
        location: Option<GeoPoint>,
        meal_hint: Option<MealType>,
    ) -> Result<RedemptionOutcome, RedemptionError> {
        let verified = match self.verifier.verify_user_token(code) {
            Ok(verified) => verified,
            Err(reason) => return Ok(invalid_token(None, reason)),
        };

        if meal_hint.is_some_and(|hint| hint != verified.meal_type) {
            return Ok(invalid_token(Some(verified.user_id), TokenRejection::NotFound));
        }

        self.redeem(Attempt {
            user_id: verified.user_id,
            mess_id,
            meal_type: verified.meal_type,
            date: verified.date,
            method: ScanMethod::UserQr,
            location,
            claim: None,
        })
        .await
    }

    async fn redeem(&self, attempt: Attempt) -> Result<RedemptionOutcome, RedemptionError> {
        let deadline = self.storage_timeout;
        let now = self.clock.now();
        let local_now = now.with_timezone(&self.utc_offset).naive_local();

        // Un QR ne vaut que pour le jour où il est présenté
        if attempt.date != local_now.date() {
            return Ok(rejected(&attempt, RedemptionRejection::WrongDay));
        }

        let mess = with_deadline(
            deadline,
            "mess lookup",
            mess::Entity::find_by_id(attempt.mess_id).one(&self.db),
        )
        .await?
        .ok_or_else(|| {
            error!(mess_id = attempt.mess_id, "Redemption for an unknown mess");
            RedemptionError::Configuration(format!("unknown mess {}", attempt.mess_id))
        })?;

        if !mess.serves_at(attempt.meal_type, local_now, self.clock_skew) {
            let rejection = RedemptionRejection::OutsideMealWindow {
                meal_type: attempt.meal_type,
            };
            return Ok(rejected(&attempt, rejection));
        }

        let eligibility = with_deadline(
            deadline,
            "eligibility",
            SubscriptionGate::check_eligibility(
                &self.db,
                attempt.user_id,
                &mess,
                attempt.date,
                attempt.meal_type,
                now,
            ),
        )
        .await?;
        let subscription = match eligibility {
            Ok(subscription) => subscription,
            Err(reason) => return Ok(rejected(&attempt, RedemptionRejection::Ineligible(reason))),
        };

        let mut entry = NewAttendance {
            user_id: attempt.user_id,
            mess_id: mess.id,
            subscription_id: subscription.id,
            date: attempt.date,
            meal_type: attempt.meal_type,
            scanned_at: now,
            location: attempt.location,
            distance_meters: None,
            method: attempt.method,
        };

        match geofence::check_proximity(&mess, attempt.location)? {
            Ok(distance) => entry.distance_meters = Some(distance),
            Err(rejection) => {
                let rejection = match rejection {
                    ProximityRejection::LocationRequired => {
                        entry.location = entry.location.filter(GeoPoint::is_well_formed);
                        RedemptionRejection::LocationRequired
                    }
                    ProximityRejection::OutOfRange { distance_meters } => {
                        entry.distance_meters = Some(distance_meters);
                        RedemptionRejection::OutOfRange { distance_meters }
                    }
                };
                self.audit_rejection(entry, &rejection).await;
                return Ok(rejected(&attempt, rejection));
            }
        }

        let task = tokio::spawn(commit(
            self.db.clone(),
            self.tokens.clone(),
            attempt.claim.clone(),
            entry,
        ));

        // Passé la deadline on rend la main, mais la tâche continue
        let outcome = match timeout(deadline, task).await {
            Ok(Ok(result)) => result?,
            Ok(Err(join_error)) => {
                error!(error = %join_error, "Attendance commit task failed");
                return Err(RedemptionError::Transient(join_error.to_string()));
            }
            Err(_) => {
                warn!(user_id = attempt.user_id, "Attendance write exceeded deadline");
                return Err(RedemptionError::Transient(
                    "attendance write timed out".to_string(),
                ));
            }
        };

        match &outcome {
            RedemptionOutcome::Redeemed(record) => info!(
                user_id = attempt.user_id,
                mess_id = record.mess_id,
                meal_type = %record.meal_type,
                date = %record.scan_date,
                method = ?record.scan_method,
                "Meal redeemed"
            ),
            RedemptionOutcome::Rejected(rejection) => {
                rejected(&attempt, rejection.clone());
            }
        }
        Ok(outcome)
    }

    /// Écriture best-effort : un échec ici ne change pas la réponse
    async fn audit_rejection(&self, entry: NewAttendance, rejection: &RedemptionRejection) {
        let write = AttendanceLedger::record_rejected_scan(&self.db, entry, rejection.code());
        if let Err(err) = with_deadline(self.storage_timeout, "rejected scan audit", write).await {
            warn!(error = %err, "Could not record rejected scan");
        }
    }
}

/// Consomme le meal QR puis écrit la présence. Le QR est remis en place si
/// l'écriture n'aboutit pas (doublon ou panne).
async fn commit(
    db: DatabaseConnection,
    tokens: Arc<dyn MealTokenStore>,
    claim: Option<String>,
    entry: NewAttendance,
) -> Result<RedemptionOutcome, RedemptionError> {
    let claimed = match claim {
        Some(code) => match tokens.take(&code).await {
            Some(claimed) => Some(claimed),
            // Consommé entre la vérification et ici
            None => {
                return Ok(RedemptionOutcome::Rejected(RedemptionRejection::InvalidToken(
                    TokenRejection::NotFound,
                )));
            }
        },
        None => None,
    };

    let meal_type = entry.meal_type;
    match AttendanceLedger::record_redemption(&db, entry).await {
        Ok(LedgerOutcome::Created(record)) => Ok(RedemptionOutcome::Redeemed(record)),
        Ok(LedgerOutcome::Duplicate) => {
            if let Some((slot, token)) = claimed {
                tokens.restore(slot, token).await;
            }
            Ok(RedemptionOutcome::Rejected(
                RedemptionRejection::AlreadyRedeemed { meal_type },
            ))
        }
        Err(err) => {
            if let Some((slot, token)) = claimed {
                tokens.restore(slot, token).await;
            }
            Err(err)
        }
    }
}

async fn with_deadline<T, E, F>(
    deadline: Duration,
    step: &'static str,
    future: F,
) -> Result<T, RedemptionError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<RedemptionError>,
{
    match timeout(deadline, future).await {
        Ok(result) => result.map_err(|err| {
            let err = err.into();
            if matches!(err, RedemptionError::Transient(_)) {
                warn!(step, error = %err, "Storage failure");
            }
            err
        }),
        Err(_) => {
            warn!(step, timeout_ms = deadline.as_millis() as u64, "Storage deadline exceeded");
            Err(RedemptionError::Transient(format!("{step} timed out")))
        }
    }
}

fn rejected(attempt: &Attempt, rejection: RedemptionRejection) -> RedemptionOutcome {
    info!(
        user_id = attempt.user_id,
        mess_id = attempt.mess_id,
        meal_type = %attempt.meal_type,
        date = %attempt.date,
        code = rejection.code(),
        reason = rejection.reason(),
        "Redemption rejected"
    );
    RedemptionOutcome::Rejected(rejection)
}

fn invalid_token(user_id: Option<i32>, reason: TokenRejection) -> RedemptionOutcome {
    info!(?user_id, reason = reason.code(), "Redemption rejected: invalid token");
    RedemptionOutcome::Rejected(RedemptionRejection::InvalidToken(reason))
}
