//! The configured backend set.
//!
//! Three backends, fixed identities and namespaces:
//! - `soccer` (primary, no prefix) with a curated tool table;
//! - `filesystem` under `fs_`, pass-through;
//! - `git` under `git_`, pass-through.
//!
//! Launch configuration is resolved per backend from `<KEY>_MCP_*`
//! environment settings, falling back to the shared Claude Desktop config.

use serde_json::Value;

use futbot_mcp::{
    empty_parameter_schema, loader, BackendSpec, CuratedTool, DescriptorPolicy,
};

pub const SOCCER_BACKEND: &str = "soccer";
pub const FS_BACKEND: &str = "filesystem";
pub const GIT_BACKEND: &str = "git";

/// The full backend roster, launch specs attached where a source had one.
pub fn default_backends() -> Vec<BackendSpec> {
    let mut soccer =
        BackendSpec::new(SOCCER_BACKEND, "", DescriptorPolicy::Curated(soccer_tools()));
    soccer.launch = loader::resolve_launch("SOCCER", "soccer-mcp");

    let mut filesystem = BackendSpec::new(FS_BACKEND, "fs_", DescriptorPolicy::PassThrough);
    filesystem.launch = loader::resolve_launch("FS", "filesystem");

    let mut git = BackendSpec::new(GIT_BACKEND, "git_", DescriptorPolicy::PassThrough);
    git.launch = loader::resolve_launch("GIT", "git");

    vec![soccer, filesystem, git]
}

/// Curated catalog of the soccer server's tools. Anything the server
/// advertises beyond these names is not exposed to the model.
fn soccer_tools() -> Vec<CuratedTool> {
    vec![
        CuratedTool::new(
            "get_competitions",
            "Obtiene todas las competiciones de fútbol disponibles con sus IDs y nombres",
            empty_parameter_schema(),
        ),
        CuratedTool::new(
            "get_teams_competitions",
            "Obtiene los equipos de una competición específica de fútbol",
            competition_id_schema(),
        ),
        CuratedTool::new(
            "get_teams_by_competition",
            "Obtiene todos los equipos de una competición específica",
            competition_id_schema(),
        ),
        CuratedTool::new(
            "get_matches_by_competition",
            "Obtiene todos los partidos de una competición específica",
            competition_id_schema(),
        ),
        CuratedTool::new(
            "get_team_by_id",
            "Obtiene información detallada de un equipo específico",
            single_string_schema("team_id", "ID del equipo"),
        ),
        CuratedTool::new(
            "get_top_scorers_by_competitions",
            "Obtiene los máximos goleadores de una competición específica",
            competition_id_schema(),
        ),
        CuratedTool::new(
            "get_player_by_id",
            "Obtiene información detallada de un jugador específico",
            single_string_schema("player_id", "ID del jugador"),
        ),
        CuratedTool::new(
            "get_info_matches_of_a_player",
            "Obtiene todos los partidos en los que ha participado un jugador específico",
            single_string_schema("player_id", "ID del jugador"),
        ),
    ]
}

fn competition_id_schema() -> Value {
    single_string_schema(
        "competition_id",
        "ID de la competición (ej: 'PL' para Premier League, 'CL' para Champions League)",
    )
}

fn single_string_schema(name: &str, description: &str) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            name: {
                "type": "string",
                "description": description,
            }
        },
        "required": [name]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_has_one_primary_and_distinct_prefixes() {
        let specs = default_backends();
        assert_eq!(specs.len(), 3);

        let primaries: Vec<_> = specs.iter().filter(|s| s.prefix.is_empty()).collect();
        assert_eq!(primaries.len(), 1);
        assert_eq!(primaries[0].id, SOCCER_BACKEND);

        let prefixes: Vec<&str> = specs.iter().map(|s| s.prefix.as_str()).collect();
        assert!(prefixes.contains(&"fs_"));
        assert!(prefixes.contains(&"git_"));
    }

    #[test]
    fn soccer_table_covers_every_curated_tool() {
        let tools = soccer_tools();
        assert_eq!(tools.len(), 8);

        let with_competition_id = tools
            .iter()
            .filter(|t| {
                t.parameter_schema["properties"]
                    .get("competition_id")
                    .is_some()
            })
            .count();
        assert_eq!(with_competition_id, 4);

        let no_args = tools
            .iter()
            .find(|t| t.raw_name == "get_competitions")
            .unwrap();
        assert!(no_args.parameter_schema["properties"]
            .as_object()
            .unwrap()
            .is_empty());

        let by_id = tools.iter().find(|t| t.raw_name == "get_team_by_id").unwrap();
        assert_eq!(by_id.parameter_schema["required"][0], "team_id");
    }
}
