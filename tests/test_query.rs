use flatdb::executor::{GroupBy, Query};
use flatdb::{Error, Record, Table};
use std::path::Path;

fn table(dir: &Path, name: &str, columns: &[&str], rows: &[&[&str]]) -> Table {
    let mut table = Table::create(dir.join(format!("{}.csv", name)), columns.iter().copied()).unwrap();
    for row in rows {
        let record: Record = columns.iter().copied().zip(row.iter().copied()).collect();
        table.append(&record).unwrap();
    }
    table
}

#[test]
fn test_pokemon_move_level() {
    let dir = tempfile::tempdir().unwrap();
    let pokemons = table(
        dir.path(),
        "pokemons",
        &["id", "identifier"],
        &[&["1", "bulbasaur"], &["4", "charmander"]],
    );
    let moves = table(
        dir.path(),
        "moves",
        &["id", "identifier"],
        &[&["1", "razor-leaf"], &["2", "ember"]],
    );
    let learns = table(
        dir.path(),
        "learns",
        &["pokemon_id", "move_id", "version_group_id", "level"],
        &[
            &["4", "2", "1", "7"],
            &["1", "1", "2", "19"],
            &["1", "1", "1", "13"],
            &["1", "2", "1", "40"],
        ],
    );

    // Reopened handles see the same content
    let pokemons = Table::open(pokemons.path()).unwrap();

    let query = Query::new([&pokemons, &moves, &learns])
        .filter(pokemons.column("id").unwrap().equals(&learns.column("pokemon_id").unwrap()))
        .filter(moves.column("id").unwrap().equals(&learns.column("move_id").unwrap()))
        .filter(pokemons.column("identifier").unwrap().equals("bulbasaur"))
        .filter(moves.column("identifier").unwrap().equals("razor-leaf"))
        .filter(learns.column("version_group_id").unwrap().equals(1))
        .project([learns.column("level").unwrap()])
        .limit(1);

    let records: Vec<Record> = query.execute().unwrap().map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].iter().collect::<Vec<_>>(), vec![("level", "13")]);

    let mut out = Vec::new();
    query.write_csv(&mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "level\r\n13\r\n");
}

#[test]
fn test_join_order_does_not_change_result_set() {
    let dir = tempfile::tempdir().unwrap();
    let left = table(dir.path(), "left", &["k", "a"], &[&["1", "x"], &["2", "y"], &["2", "z"]]);
    let right = table(dir.path(), "right", &["k", "b"], &[&["2", "p"], &["1", "q"], &["3", "r"]]);

    let a = left.column("a").unwrap();
    let b = right.column("b").unwrap();
    let on = left.column("k").unwrap().equals(&right.column("k").unwrap());

    let collect = |query: Query| {
        let mut pairs: Vec<(String, String)> = query
            .execute()
            .unwrap()
            .map(|r| {
                let r = r.unwrap();
                (r.get("a").unwrap().to_string(), r.get("b").unwrap().to_string())
            })
            .collect();
        pairs.sort();
        pairs
    };

    let forward = collect(
        Query::new([&left, &right])
            .filter(on.clone())
            .project([a.clone(), b.clone()]),
    );
    let backward = collect(Query::new([&right, &left]).filter(on).project([a, b]));

    assert_eq!(forward, backward);
    assert_eq!(
        forward,
        vec![
            ("x".to_string(), "q".to_string()),
            ("y".to_string(), "p".to_string()),
            ("z".to_string(), "p".to_string())
        ]
    );
}

#[test]
fn test_limit_yields_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let numbers = table(
        dir.path(),
        "numbers",
        &["n"],
        &[&["1"], &["2"], &["3"], &["4"], &["5"], &["6"]],
    );
    let n = numbers.column("n").unwrap();

    for limit in [0, 1, 3, 100] {
        let capped: Vec<Record> = Query::new([&numbers])
            .filter(n.greater_than(2))
            .limit(limit)
            .execute()
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        let expected: Vec<Record> = Query::new([&numbers])
            .filter(n.greater_than(2))
            .execute()
            .unwrap()
            .map(|r| r.unwrap())
            .take(limit)
            .collect();
        assert_eq!(capped.len(), limit.min(4));
        assert_eq!(capped, expected, "limit {}", limit);
    }
}

#[test]
fn test_self_join_through_second_handle() {
    let dir = tempfile::tempdir().unwrap();
    let people = table(
        dir.path(),
        "people",
        &["id", "name", "manager"],
        &[&["1", "Ada", ""], &["2", "Bo", "1"], &["3", "Cy", "1"]],
    );
    let managers = Table::open(people.path()).unwrap();

    let query = Query::new([&people, &managers])
        .filter(people.column("manager").unwrap().equals(&managers.column("id").unwrap()))
        .project_as([
            (people.column("name").unwrap(), "employee"),
            (managers.column("name").unwrap(), "manager"),
        ]);

    let mut out = Vec::new();
    assert_eq!(query.write_csv(&mut out).unwrap(), 2);
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "employee,manager\r\nBo,Ada\r\nCy,Ada\r\n"
    );
}

#[test]
fn test_duplicate_alias_fails_before_reading() {
    let dir = tempfile::tempdir().unwrap();
    let a = table(dir.path(), "a", &["id"], &[&["1"]]);
    let b = table(dir.path(), "b", &["id"], &[&["1"]]);

    let default = Query::new([&a, &b]);
    assert!(matches!(default.execute(), Err(Error::DuplicateAlias(name)) if name == "id"));

    let renamed = Query::new([&a, &b]).project_as([
        (a.column("id").unwrap(), "a_id"),
        (b.column("id").unwrap(), "b_id"),
    ]);
    assert_eq!(renamed.execute().unwrap().count(), 1);
}

#[test]
fn test_group_by_over_join() {
    let dir = tempfile::tempdir().unwrap();
    let pokemons = table(dir.path(), "pokemons", &["id", "identifier"], &[&["1", "bulbasaur"], &["4", "charmander"]]);
    let learns = table(
        dir.path(),
        "learns",
        &["pokemon_id", "move_id"],
        &[&["4", "2"], &["1", "1"], &["4", "3"], &["4", "1"]],
    );

    let query = Query::new([&learns, &pokemons])
        .filter(pokemons.column("id").unwrap().equals(&learns.column("pokemon_id").unwrap()));
    let group = GroupBy::new(query, [pokemons.column("identifier").unwrap()]);

    let counts: Vec<(String, String)> = group
        .count()
        .unwrap()
        .iter()
        .map(|r| (r.get("identifier").unwrap().to_string(), r.get("count").unwrap().to_string()))
        .collect();
    assert_eq!(
        counts,
        vec![
            ("charmander".to_string(), "3".to_string()),
            ("bulbasaur".to_string(), "1".to_string())
        ]
    );
}
