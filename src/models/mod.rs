// ============================================================================
// MODELS - MODULE PRINCIPAL
// ============================================================================
//
// Description:
//   Point d'entrée pour tous les modèles de données.
//   Chaque entité correspond à une table avec SeaORM (PostgreSQL en prod,
//   SQLite en mémoire pour les tests).
//
// Liste des modules:
//   - meal_type : Petit-déjeuner / déjeuner / dîner
//   - mess : Cantines (ancre du géofence, fenêtres de repas)
//   - subscription : Abonnements (période, paiement, repas inclus)
//   - meal_confirmation : Pré-confirmations de repas
//   - attendance : Journal des passages (valides + refus audités)
//   - meal_token : QR éphémères (jamais persistés)
//   - dto : Requêtes et réponses de l'API
//
// Points d'attention:
//   - Tous les modèles utilisent SeaORM (pas de SQL brut)
//   - Les enums sont stockés en VARCHAR (DeriveActiveEnum)
//   - Les relations entre tables sont définies dans chaque modèle
//
// ============================================================================

pub mod attendance;
pub mod dto;
pub mod meal_confirmation;
pub mod meal_token;
pub mod meal_type;
pub mod mess;
pub mod subscription;
