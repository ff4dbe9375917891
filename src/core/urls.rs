#[derive(Debug)]
pub struct ApiUrls;

impl ApiUrls {
    // Health - public
    pub const HEALTH: &'static str = "/health";

    // User
    pub const USER_ME: &'static str = "/api/user/me";

    // Tasks - boards, lists, cards
    pub const BOARDS: &'static str = "/api/boards";
    pub const BOARD_BY_ID: &'static str = "/api/boards/:id";
    pub const LISTS: &'static str = "/api/lists";
    pub const LIST_BY_ID: &'static str = "/api/lists/:id";
    pub const CARDS: &'static str = "/api/cards";
    pub const CARDS_TODAY: &'static str = "/api/cards/today";
    pub const CARD_BY_ID: &'static str = "/api/cards/:id";
    pub const CARD_MEMBERS: &'static str = "/api/cards/:id/members";
    pub const CARD_MEMBER: &'static str = "/api/cards/:id/members/:user_id";
    pub const CARD_CHECKLISTS: &'static str = "/api/cards/:id/checklists";
    pub const CARD_COMMENTS: &'static str = "/api/cards/:id/comments";
    pub const CARD_ATTACHMENTS: &'static str = "/api/cards/:id/attachments";

    // Tasks - card sub-resources
    pub const CHECKLISTS: &'static str = "/api/checklists";
    pub const CHECKLIST_BY_ID: &'static str = "/api/checklists/:id";
    pub const CHECKLIST_ITEMS: &'static str = "/api/checklist-items";
    pub const CHECKLIST_ITEM_BY_ID: &'static str = "/api/checklist-items/:id";
    pub const COMMENTS: &'static str = "/api/comments";
    pub const COMMENT_BY_ID: &'static str = "/api/comments/:id";
    pub const ATTACHMENTS: &'static str = "/api/attachments";
    pub const ATTACHMENT_BY_ID: &'static str = "/api/attachments/:id";

    // Shopping
    pub const SHOPPING_LISTS: &'static str = "/api/shopping/lists";
    pub const SHOPPING_LIST_BY_ID: &'static str = "/api/shopping/lists/:id";
    pub const SHOPPING_LIST_BULK: &'static str = "/api/shopping/lists/:id/items/bulk";
    pub const SHOPPING_LIST_UNCHECK_ALL: &'static str = "/api/shopping/lists/:id/uncheck-all";
    pub const SHOPPING_ITEMS: &'static str = "/api/shopping/items";
    pub const SHOPPING_ITEM_BY_ID: &'static str = "/api/shopping/items/:id";

    // Meals
    pub const RECIPES: &'static str = "/api/recipes";
    pub const RECIPE_BY_ID: &'static str = "/api/recipes/:id";
    pub const MEAL_PLANS: &'static str = "/api/meal-plans";
    pub const MEAL_PLAN_MEALS: &'static str = "/api/meal-plans/meals";
    pub const MEAL_PLAN_INGREDIENTS: &'static str = "/api/meal-plans/ingredients";

    // Budget
    pub const BUDGET_CATEGORIES: &'static str = "/api/budget/categories";
    pub const BUDGET_CATEGORY_BY_ID: &'static str = "/api/budget/categories/:id";
    pub const BUDGET_TRANSACTIONS: &'static str = "/api/budget/transactions";
    pub const BUDGET_TRANSACTION_BY_ID: &'static str = "/api/budget/transactions/:id";
    pub const BUDGET_SUMMARY: &'static str = "/api/budget/summary";

    // Calendar
    pub const CALENDAR_EVENTS: &'static str = "/api/calendar/events";
    pub const CALENDAR_EVENT_BY_ID: &'static str = "/api/calendar/events/:id";
    pub const CALENDAR_EXPORT: &'static str = "/api/calendar/export.ics";
    pub const CALENDAR_IMPORT: &'static str = "/api/calendar/import";

    // Goals
    pub const GOALS: &'static str = "/api/goals";
    pub const GOAL_BY_ID: &'static str = "/api/goals/:id";

    // Journal
    pub const JOURNAL_ENTRIES: &'static str = "/api/journal/entries";
    pub const JOURNAL_ENTRY_BY_ID: &'static str = "/api/journal/entries/:id";

    // Habits
    pub const HABITS: &'static str = "/api/habits";
    pub const HABIT_BY_ID: &'static str = "/api/habits/:id";
    pub const HABITS_TRACK: &'static str = "/api/habits/track";
    pub const HABITS_UNTRACK: &'static str = "/api/habits/untrack";
}
