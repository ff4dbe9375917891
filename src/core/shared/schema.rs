diesel::table! {
    boards (id) {
        id -> Int8,
        title -> Text,
        background -> Text,
        user_id -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    lists (id) {
        id -> Int8,
        title -> Text,
        position -> Int4,
        board_id -> Int8,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    cards (id) {
        id -> Int8,
        title -> Text,
        description -> Text,
        position -> Int4,
        list_id -> Int8,
        due_date -> Nullable<Timestamptz>,
        labels -> Array<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    card_members (id) {
        id -> Int8,
        card_id -> Int8,
        user_id -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    checklists (id) {
        id -> Int8,
        title -> Text,
        card_id -> Int8,
        position -> Int4,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    checklist_items (id) {
        id -> Int8,
        title -> Text,
        checklist_id -> Int8,
        completed -> Bool,
        position -> Int4,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    comments (id) {
        id -> Int8,
        content -> Text,
        card_id -> Int8,
        user_id -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    attachments (id) {
        id -> Int8,
        name -> Text,
        url -> Text,
        size_bytes -> Nullable<Int8>,
        mime_type -> Nullable<Text>,
        card_id -> Int8,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    shopping_lists (id) {
        id -> Int8,
        title -> Text,
        user_id -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    shopping_items (id) {
        id -> Int8,
        name -> Text,
        is_checked -> Bool,
        list_id -> Int8,
        position -> Int4,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    recipes (id) {
        id -> Int8,
        name -> Text,
        instructions -> Text,
        user_id -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    recipe_ingredients (id) {
        id -> Int8,
        recipe_id -> Int8,
        name -> Text,
        quantity -> Text,
        position -> Int4,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    meal_plans (id) {
        id -> Int8,
        week_of -> Date,
        user_id -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    meal_plan_entries (id) {
        id -> Int8,
        meal_plan_id -> Int8,
        day_of_week -> Int4,
        meal_type -> Text,
        recipe_id -> Nullable<Int8>,
        custom_meal -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    budget_categories (id) {
        id -> Int8,
        name -> Text,
        kind -> Text,
        user_id -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    transactions (id) {
        id -> Int8,
        description -> Text,
        amount -> Numeric,
        kind -> Text,
        category_id -> Nullable<Int8>,
        date -> Date,
        user_id -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    events (id) {
        id -> Int8,
        title -> Text,
        description -> Nullable<Text>,
        date -> Timestamptz,
        user_id -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    goals (id) {
        id -> Int8,
        title -> Text,
        description -> Nullable<Text>,
        target_value -> Float8,
        current_value -> Float8,
        unit -> Text,
        target_date -> Date,
        status -> Text,
        user_id -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    journal_entries (id) {
        id -> Int8,
        title -> Text,
        content -> Text,
        mood -> Nullable<Text>,
        date -> Date,
        user_id -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    habits (id) {
        id -> Int8,
        name -> Text,
        description -> Nullable<Text>,
        color -> Text,
        icon -> Text,
        frequency -> Text,
        user_id -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    habit_entries (id) {
        id -> Int8,
        habit_id -> Int8,
        completed_at -> Date,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(lists -> boards (board_id));
diesel::joinable!(cards -> lists (list_id));
diesel::joinable!(card_members -> cards (card_id));
diesel::joinable!(checklists -> cards (card_id));
diesel::joinable!(checklist_items -> checklists (checklist_id));
diesel::joinable!(comments -> cards (card_id));
diesel::joinable!(attachments -> cards (card_id));
diesel::joinable!(shopping_items -> shopping_lists (list_id));
diesel::joinable!(recipe_ingredients -> recipes (recipe_id));
diesel::joinable!(meal_plan_entries -> meal_plans (meal_plan_id));
diesel::joinable!(meal_plan_entries -> recipes (recipe_id));
diesel::joinable!(transactions -> budget_categories (category_id));
diesel::joinable!(habit_entries -> habits (habit_id));

diesel::allow_tables_to_appear_in_same_query!(
    boards,
    lists,
    cards,
    card_members,
    checklists,
    checklist_items,
    comments,
    attachments,
    shopping_lists,
    shopping_items,
    recipes,
    recipe_ingredients,
    meal_plans,
    meal_plan_entries,
    budget_categories,
    transactions,
    events,
    goals,
    journal_entries,
    habits,
    habit_entries,
);
